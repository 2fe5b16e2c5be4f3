//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns. A middleware is a decorator: given the next
//! handler in the chain it returns a new handler that does its work and then
//! (maybe) calls through.
//!
//! Built-in middleware:
//! - [`recover::Recover`] — contains panics, answers `500`
//! - [`trace::Trace`] — request correlation id, start/completion logging
//! - [`rate_limit::RateLimit`] — per-client token-bucket admission control
//!
//! # Composition
//!
//! [`Pipeline`] lists middleware **outermost first**, the order a request
//! travels through them. The response travels back in reverse.
//!
//! ```rust,no_run
//! use turnstile::middleware::rate_limit::{RateLimit, RateLimitConfig};
//! use turnstile::middleware::{Pipeline, recover::Recover, trace::Trace};
//! use turnstile::{Request, Response, Server};
//!
//! # async fn run() -> Result<(), turnstile::Error> {
//! let server = Server::bind("0.0.0.0:3000");
//!
//! let app = Pipeline::new()
//!     .wrap(Recover)
//!     .wrap(Trace)
//!     .wrap(RateLimit::new(RateLimitConfig::from_env()?).shutdown_on(server.shutdown_token()))
//!     .handler(app);
//!
//! server.serve(app).await
//! # }
//! async fn app(_req: Request) -> Response { Response::text("ok") }
//! ```
//!
//! Request: `Recover → Trace → RateLimit → app`.

pub mod rate_limit;
pub mod recover;
pub mod trace;

use crate::handler::{BoxedHandler, Handler, private};
use crate::request::Request;
use crate::response::Response;

/// A request-processing stage that decorates the next handler.
///
/// `wrap` runs once, when the chain is built. It may return `next`
/// unchanged, so a disabled middleware costs nothing per request.
pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler;
}

/// Builder for a middleware chain.
#[derive(Default)]
pub struct Pipeline {
    layers: Vec<Box<dyn Middleware>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `middleware` inside every middleware added before it.
    pub fn wrap(mut self, middleware: impl Middleware) -> Self {
        self.layers.push(Box::new(middleware));
        self
    }

    /// Terminates the pipeline with the application handler.
    ///
    /// Layers are applied innermost first, so the first one added ends up
    /// outermost.
    pub fn handler(self, app: impl Handler) -> Chain {
        let inner = self
            .layers
            .iter()
            .rev()
            .fold(app.into_boxed_handler(), |next, layer| layer.wrap(next));
        Chain { inner }
    }
}

/// A fully composed handler chain, ready to be served.
#[derive(Clone)]
pub struct Chain {
    inner: BoxedHandler,
}

impl Chain {
    /// Runs `req` through the chain in-process.
    pub async fn call(&self, req: Request) -> Response {
        self.inner.call(req).await
    }
}

impl private::Sealed for Chain {}

impl Handler for Chain {
    fn into_boxed_handler(self) -> BoxedHandler {
        self.inner
    }
}
