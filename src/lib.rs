//! # turnstile
//!
//! A minimal HTTP framework built around one idea: a request passes through a
//! short, fixed chain of middleware on its way to your handler.
//!
//! ```text
//! request → Recover → Trace → RateLimit → app
//! ```
//!
//! - [`Recover`](middleware::recover::Recover) — a panic anywhere downstream
//!   becomes one `500`, the process keeps serving.
//! - [`Trace`](middleware::trace::Trace) — correlation id (`X-Request-ID` or a
//!   fresh UUID) attached to the request and every log line.
//! - [`RateLimit`](middleware::rate_limit::RateLimit) — per-client token
//!   bucket, `429` when empty, idle clients evicted in the background.
//!
//! Built on hyper (HTTP/1.1 and HTTP/2) and tokio, with graceful shutdown on
//! SIGTERM / Ctrl-C.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use turnstile::middleware::Pipeline;
//! use turnstile::middleware::rate_limit::{RateLimit, RateLimitConfig};
//! use turnstile::middleware::recover::Recover;
//! use turnstile::middleware::trace::Trace;
//! use turnstile::{Request, Response, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), turnstile::Error> {
//!     let config = RateLimitConfig::from_env()?;
//!     let server = Server::bind("0.0.0.0:3000");
//!
//!     let app = Pipeline::new()
//!         .wrap(Recover)
//!         .wrap(Trace)
//!         .wrap(RateLimit::new(config).shutdown_on(server.shutdown_token()))
//!         .handler(hello);
//!
//!     server.serve(app).await
//! }
//!
//! async fn hello(req: Request) -> Response {
//!     let id = req.request_id().map(|id| id.to_string()).unwrap_or_default();
//!     Response::json(format!(r#"{{"request_id":"{id}"}}"#).into_bytes())
//! }
//! ```

mod error;
mod handler;
mod request;
mod response;
mod server;

pub mod middleware;

pub use error::{ConfigError, Error, RequestError};
pub use handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use server::Server;
