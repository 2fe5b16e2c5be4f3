//! Request correlation and request logging.
//!
//! Every request gets exactly one [`RequestId`], attached to its context
//! before anything downstream runs:
//!
//! - inbound `X-Request-ID: abc123` → `ext-abc123` (the prefix marks ids the
//!   client supplied, so logs never confuse them with ours)
//! - no header, or an empty one → a fresh UUIDv4
//!
//! The downstream future runs inside a `request` span carrying the id, so
//! every event logged further down the chain is correlated for free.

use std::fmt;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::middleware::Middleware;
use crate::request::Request;

/// Inbound header carrying a caller-supplied correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const EXTERNAL_PREFIX: &str = "ext-";

/// Correlation identifier for one request.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// A fresh, globally unique identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Tags a caller-supplied id as external.
    pub fn external(supplied: &str) -> Self {
        Self(format!("{EXTERNAL_PREFIX}{supplied}"))
    }

    /// Resolves the id for an inbound header value.
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => Self::external(v),
            _ => Self::generate(),
        }
    }

    /// `true` when the id was supplied by the caller.
    pub fn is_external(&self) -> bool {
        self.0.starts_with(EXTERNAL_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlation + logging middleware.
pub struct Trace;

impl Middleware for Trace {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(Traced { next })
    }
}

struct Traced {
    next: BoxedHandler,
}

impl ErasedHandler for Traced {
    fn call(&self, mut req: Request) -> BoxFuture {
        let start = Instant::now();
        let id = RequestId::from_header(req.header(REQUEST_ID_HEADER));
        let span = info_span!("request", request_id = %id);

        let method = req.method().clone();
        let url = req.uri().to_string();
        req.extensions_mut().insert(id);

        let next = Arc::clone(&self.next);
        Box::pin(
            async move {
                info!("request started");

                let res = next.call(req).await;

                info!(
                    request_method = %method,
                    request_url = %url,
                    status = res.status_code().as_u16(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "request completed"
                );
                res
            }
            .instrument(span),
        )
    }
}
