//! Per-client rate limiter state.
//!
//! The store is the only state shared between concurrent requests and the
//! reaper. It is a sharded map: every operation on one client runs under that
//! client's shard lock, so lookup, `last_seen` refresh and token consumption
//! form one linearizable step per client. The lock is never held across an
//! `.await`.

use std::net::IpAddr;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::one::RefMut;
use tokio::time::Instant;

use super::bucket::TokenBucket;

/// Rate limiter state for one client.
#[derive(Debug)]
pub struct ClientEntry {
    pub limiter: TokenBucket,
    pub last_seen: Instant,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// Denied. `retry_after` is `None` when the bucket never refills.
    Denied { retry_after: Option<Duration> },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Concurrent map from client identity to [`ClientEntry`].
///
/// Unbounded by size: the reaper's staleness sweep is the only bound on
/// memory.
#[derive(Debug)]
pub struct ClientStore {
    rate: f64,
    burst: u32,
    clients: DashMap<IpAddr, ClientEntry>,
}

impl ClientStore {
    /// New clients start with a full bucket of `burst` tokens refilled at
    /// `rate` per second.
    pub fn new(rate: f64, burst: u32) -> Self {
        Self { rate, burst, clients: DashMap::new() }
    }

    /// Returns the entry for `client`, inserting a fresh one if absent, and
    /// marks it seen at `now`. `last_seen` never moves backwards, even when a
    /// caller that read the clock earlier takes the lock later.
    ///
    /// The returned guard holds the client's shard lock. Drop it before
    /// awaiting anything.
    pub fn get_or_create(&self, client: IpAddr, now: Instant) -> RefMut<'_, IpAddr, ClientEntry> {
        let mut entry = self.clients.entry(client).or_insert_with(|| ClientEntry {
            limiter: TokenBucket::new_at(self.rate, self.burst, now),
            last_seen: now,
        });
        entry.last_seen = entry.last_seen.max(now);
        entry
    }

    /// Marks `client` seen and tries to take one token, atomically.
    pub fn admit(&self, client: IpAddr, now: Instant) -> Admission {
        let mut entry = self.get_or_create(client, now);
        if entry.limiter.allow_at(now) {
            Admission::Allowed
        } else {
            Admission::Denied { retry_after: entry.limiter.retry_after(now) }
        }
    }

    /// Removes every client not seen for longer than `stale_after`. Returns
    /// how many were removed.
    pub fn sweep(&self, stale_after: Duration, now: Instant) -> usize {
        let before = self.clients.len();
        self.clients
            .retain(|_, entry| now.saturating_duration_since(entry.last_seen) <= stale_after);
        before.saturating_sub(self.clients.len())
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn contains(&self, client: &IpAddr) -> bool {
        self.clients.contains_key(client)
    }
}
