//! Minimal turnstile example: the full middleware chain in front of a tiny app.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!   RATE_LIMIT_RATE=1 RATE_LIMIT_BURST=2 cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/tenants/42
//!   curl -i -H 'x-request-id: abc123' http://localhost:3000/tenants/42
//!   curl -i http://localhost:3000/panic
//!   for i in $(seq 30); do curl -s -o /dev/null -w '%{http_code}\n' http://localhost:3000/; done

use http::{Method, StatusCode};
use turnstile::middleware::Pipeline;
use turnstile::middleware::rate_limit::{RateLimit, RateLimitConfig};
use turnstile::middleware::recover::Recover;
use turnstile::middleware::trace::Trace;
use turnstile::{Request, Response, Server};

#[tokio::main]
async fn main() -> Result<(), turnstile::Error> {
    tracing_subscriber::fmt::init();

    // Invalid RATE_LIMIT_* values stop the process here.
    let config = RateLimitConfig::from_env()?;

    let server = Server::bind("0.0.0.0:3000");

    let app = Pipeline::new()
        .wrap(Recover)
        .wrap(Trace)
        .wrap(RateLimit::new(config).shutdown_on(server.shutdown_token()))
        .handler(route);

    server.serve(app).await
}

async fn route(req: Request) -> Response {
    let segments: Vec<&str> = req.path().trim_matches('/').split('/').collect();

    match (req.method(), segments.as_slice()) {
        (&Method::GET, [""]) => Response::text("ok"),
        (&Method::GET, ["tenants", id]) => get_tenant(&req, id),
        (&Method::GET, ["panic"]) => panic!("demo handler panicked"),
        _ => Response::status(StatusCode::NOT_FOUND),
    }
}

// GET /tenants/:id — echoes the id and the request's correlation id.
fn get_tenant(req: &Request, id: &str) -> Response {
    let request_id = req.request_id().map(|id| id.to_string()).unwrap_or_default();
    let body = serde_json::json!({ "id": id, "name": "acme", "request_id": request_id });
    Response::json(body.to_string().into_bytes())
}
