//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! A middleware chain is a stack of handlers of *different* concrete types,
//! each holding the next one. Rust cannot name that nested type, so every
//! link is stored behind a **trait object** (`dyn ErasedHandler`).
//!
//! ```text
//! async fn app(req: Request) -> Response { … }    ← user writes this
//!        ↓ Pipeline::new().handler(app)
//! app.into_boxed_handler()                        ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(app))                        ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! middleware.wrap(next)                           ← each middleware decorates
//!        ↓
//! handler.call(req)  at request time              ← one vtable dispatch per link
//! ```
//!
//! The cost per request is one virtual call per chain link, negligible next
//! to network I/O.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A heap-allocated, type-erased future that resolves to a [`Response`].
///
/// `Send + 'static` let tokio move the future across worker threads.
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Dispatch interface shared by application handlers and middleware.
///
/// Middleware authors implement this on the wrapper they return from
/// [`Middleware::wrap`](crate::middleware::Middleware::wrap); application code
/// never needs to.
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for everything [`Server::serve`](crate::Server::serve) and
/// [`Pipeline::handler`](crate::middleware::Pipeline::handler) accept.
///
/// Satisfied automatically by any `async fn` with the signature
///
/// ```text
/// async fn name(req: Request) -> impl IntoResponse
/// ```
///
/// and by a composed [`Chain`](crate::middleware::Chain). The trait is
/// **sealed**: only impls inside this crate can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

pub(crate) mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Bridges a concrete handler function to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}
