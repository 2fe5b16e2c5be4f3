//! Per-client rate limiting.
//!
//! Each client, identified by the IP of its TCP peer (port dropped), owns a
//! [`TokenBucket`] of `burst` tokens refilled at `rate` per second. A request
//! that finds a token goes through. One that does not gets `429 Too Many
//! Requests` and never reaches the inner handler.
//!
//! Client state lives in a [`ClientStore`] until a [`Reaper`] finds it idle
//! for longer than the staleness window. That sweep is the only bound on the
//! store's memory.
//!
//! A disabled [`RateLimitConfig`] makes [`RateLimit`] a pure pass-through:
//! the inner handler is returned unwrapped and no store or reaper is ever
//! created.

mod bucket;
mod config;
mod reaper;
mod store;

use std::net::IpAddr;
use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::RequestError;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::middleware::Middleware;
use crate::request::Request;
use crate::response::Response;

pub use bucket::TokenBucket;
pub use config::{
    ENV_BURST, ENV_ENABLED, ENV_RATE, ENV_STALE_AFTER, ENV_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL,
    RateLimitConfig,
};
pub use reaper::Reaper;
pub use store::{Admission, ClientEntry, ClientStore};

/// Rate limit middleware.
pub struct RateLimit {
    config: RateLimitConfig,
    store: Option<Arc<ClientStore>>,
    shutdown: CancellationToken,
}

impl RateLimit {
    pub fn new(config: RateLimitConfig) -> Self {
        let store = config
            .enabled()
            .then(|| Arc::new(ClientStore::new(config.rate(), config.burst())));
        Self { config, store, shutdown: CancellationToken::new() }
    }

    /// Stops the reaper when `token` is cancelled, typically
    /// [`Server::shutdown_token`](crate::Server::shutdown_token).
    pub fn shutdown_on(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// The client store, or `None` when rate limiting is disabled.
    pub fn clients(&self) -> Option<&Arc<ClientStore>> {
        self.store.as_ref()
    }
}

impl Middleware for RateLimit {
    /// Must be called within a tokio runtime when enabled: starts the reaper.
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        let Some(store) = &self.store else {
            return next;
        };

        info!(
            rate = self.config.rate(),
            burst = self.config.burst(),
            sweep_interval = ?self.config.sweep_interval(),
            stale_after = ?self.config.stale_after(),
            "rate limit middleware enabled"
        );

        let reaper = Reaper::spawn(
            Arc::clone(store),
            self.config.sweep_interval(),
            self.config.stale_after(),
            &self.shutdown,
        );

        Arc::new(RateLimited { store: Arc::clone(store), next, _reaper: reaper })
    }
}

struct RateLimited {
    store: Arc<ClientStore>,
    next: BoxedHandler,
    // Cancelled on drop, so the sweep loop lives exactly as long as the chain.
    _reaper: Reaper,
}

impl ErasedHandler for RateLimited {
    fn call(&self, req: Request) -> BoxFuture {
        let Some(client) = client_identity(&req) else {
            let err = RequestError::RemoteAddress;
            error!(error = %err, "could not resolve remote address");
            return Box::pin(async move { Response::server_error(&err) });
        };

        match self.store.admit(client, Instant::now()) {
            Admission::Allowed => self.next.call(req),
            Admission::Denied { retry_after } => {
                debug!(%client, "rate limit exceeded");
                Box::pin(async move { Response::too_many_requests(retry_after) })
            }
        }
    }
}

/// Host part of the caller's transport address.
fn client_identity(req: &Request) -> Option<IpAddr> {
    req.remote_addr().map(|addr| addr.ip())
}
