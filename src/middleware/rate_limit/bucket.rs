//! Token bucket.

use std::time::Duration;

use tokio::time::Instant;

/// A token bucket holding at most `burst` tokens, refilled continuously at
/// `rate` tokens per second.
///
/// Not synchronised: the owner serialises access. In the rate limiter that is
/// the client store's per-key lock.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    tokens: f64,
    last: Instant,
}

impl TokenBucket {
    /// A full bucket. A `rate` of zero never refills.
    pub fn new(rate: f64, burst: u32) -> Self {
        Self::new_at(rate, burst, Instant::now())
    }

    pub fn new_at(rate: f64, burst: u32, now: Instant) -> Self {
        let capacity = f64::from(burst);
        Self { rate: rate.max(0.0), capacity, tokens: capacity, last: now }
    }

    /// Takes one token if one is available right now.
    pub fn allow(&mut self) -> bool {
        self.allow_at(Instant::now())
    }

    pub fn allow_at(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// How long until the next token is available, or `None` if the bucket
    /// never refills.
    pub fn retry_after(&self, now: Instant) -> Option<Duration> {
        let tokens = self.tokens_at(now);
        if tokens >= 1.0 {
            return Some(Duration::ZERO);
        }
        if self.rate <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64((1.0 - tokens) / self.rate).ok()
    }

    /// Tokens available at `now`, without taking any.
    pub fn available(&self, now: Instant) -> f64 {
        self.tokens_at(now)
    }

    fn tokens_at(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        (self.tokens + elapsed * self.rate).min(self.capacity)
    }

    fn refill(&mut self, now: Instant) {
        // A clock that appears to go backwards adds nothing and keeps `last`.
        if now > self.last {
            self.tokens = self.tokens_at(now);
            self.last = now;
        }
    }
}
