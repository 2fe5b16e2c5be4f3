//! Panic containment.
//!
//! [`Recover`] must be the outermost middleware: it can only catch what runs
//! inside it. A panic anywhere downstream becomes a
//! [`RequestError::Panic`], rendered as a `500` with `Connection: close` so
//! the connection is not reused. The process, the rate limiter state and every
//! other in-flight request are unaffected.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::error;

use crate::error::RequestError;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::middleware::Middleware;
use crate::request::Request;
use crate::response::Response;

/// Panic recovery middleware.
pub struct Recover;

impl Middleware for Recover {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(Recovered { next })
    }
}

struct Recovered {
    next: BoxedHandler,
}

impl ErasedHandler for Recovered {
    fn call(&self, req: Request) -> BoxFuture {
        let next = Arc::clone(&self.next);
        Box::pin(async move {
            // `next.call` runs inside the guarded future so a panic while
            // building the downstream future is caught too.
            let guarded = AssertUnwindSafe(async move { next.call(req).await });

            match guarded.catch_unwind().await {
                Ok(res) => res,
                Err(payload) => {
                    let err = RequestError::Panic(panic_message(payload.as_ref()));
                    error!(error = %err, "request panicked");

                    let mut res = Response::server_error(&err);
                    res.set_header("connection", "close");
                    res
                }
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::StatusCode;

    use super::*;
    use crate::middleware::Pipeline;

    async fn app(req: Request) -> Response {
        match req.path() {
            "/boom" => panic!("boom"),
            _ => Response::text("fine"),
        }
    }

    fn request(path: &str) -> Request {
        let req = http::Request::builder().uri(path).body(Bytes::new()).unwrap();
        Request::from_http(req, None)
    }

    #[tokio::test]
    async fn panic_becomes_500_and_chain_keeps_serving() {
        let chain = Pipeline::new().wrap(Recover).handler(app);

        let res = chain.call(request("/boom")).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.header("connection"), Some("close"));
        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["error"]["kind"], "panic");
        assert_eq!(body["error"]["status"], 500);

        let res = chain.call(request("/")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"fine");
        assert!(res.header("connection").is_none());
    }

    #[tokio::test]
    async fn synchronous_panic_in_handler_construction_is_caught() {
        let chain = Pipeline::new()
            .wrap(Recover)
            .handler(|_req: Request| -> std::future::Ready<Response> {
                panic!("before any future exists")
            });

        let res = chain.call(request("/")).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn payload_rendering() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&String::from("tenant 42 missing")), "tenant 42 missing");
        assert_eq!(panic_message(&7_u32), "unknown panic payload");
    }
}
