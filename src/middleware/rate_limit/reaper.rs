//! Background eviction of idle clients.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::MAX_SWEEP_INTERVAL;
use super::store::ClientStore;

/// A long-lived task sweeping a [`ClientStore`] every `interval`, evicting
/// clients idle for longer than `stale_after`.
///
/// Stops when the token it was spawned with is cancelled, when
/// [`shutdown`](Reaper::shutdown) is called, or when the `Reaper` is dropped.
/// Once stopped it never sweeps again.
pub struct Reaper {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Reaper {
    /// Spawns the sweep loop on the current tokio runtime.
    ///
    /// The first sweep happens one `interval` after spawning. Intervals longer
    /// than [`MAX_SWEEP_INTERVAL`] are clamped to it. `shutdown` is a parent
    /// token: cancelling it stops this reaper, while stopping this reaper
    /// leaves the parent untouched.
    pub fn spawn(
        store: Arc<ClientStore>,
        interval: Duration,
        stale_after: Duration,
        shutdown: &CancellationToken,
    ) -> Self {
        let token = shutdown.child_token();
        let interval = interval.min(MAX_SWEEP_INTERVAL);
        let handle = tokio::spawn(run(store, interval, stale_after, token.clone()));
        Self { token, handle: Some(handle) }
    }

    /// Stops the loop and waits for the task to finish.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("rate limit reaper task failed: {e}");
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run(
    store: Arc<ClientStore>,
    interval: Duration,
    stale_after: Duration,
    token: CancellationToken,
) {
    let mut tick = tokio::time::interval_at(Instant::now() + interval, interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Cancellation wins over a tick that is ready at the same time.
            biased;

            () = token.cancelled() => break,

            _ = tick.tick() => {
                let evicted = store.sweep(stale_after, Instant::now());
                debug!(evicted, remaining = store.len(), "rate limit sweep");
            }
        }
    }

    debug!("rate limit reaper stopped");
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;

    const CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20));
    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn evicts_idle_clients_on_schedule() {
        let store = Arc::new(ClientStore::new(1.0, 1));
        let shutdown = CancellationToken::new();
        let reaper = Reaper::spawn(Arc::clone(&store), MINUTE, 3 * MINUTE, &shutdown);

        store.admit(CLIENT, Instant::now());

        // Idle for three minutes: not yet past the threshold.
        tokio::time::sleep(3 * MINUTE + Duration::from_millis(1)).await;
        assert!(store.contains(&CLIENT));

        // The four-minute sweep sees it idle for four minutes.
        tokio::time::sleep(MINUTE).await;
        assert!(!store.contains(&CLIENT));

        reaper.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn active_clients_survive_sweeps() {
        let store = Arc::new(ClientStore::new(1.0, 1));
        let shutdown = CancellationToken::new();
        let _reaper = Reaper::spawn(Arc::clone(&store), MINUTE, 3 * MINUTE, &shutdown);

        for _ in 0..10 {
            store.admit(CLIENT, Instant::now());
            tokio::time::sleep(MINUTE).await;
        }
        assert!(store.contains(&CLIENT));
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cancellation_stops_sweeping() {
        let store = Arc::new(ClientStore::new(1.0, 1));
        let shutdown = CancellationToken::new();
        let reaper = Reaper::spawn(Arc::clone(&store), MINUTE, MINUTE, &shutdown);

        shutdown.cancel();
        tokio::task::yield_now().await;

        store.admit(CLIENT, Instant::now());
        tokio::time::sleep(10 * MINUTE).await;
        assert!(store.contains(&CLIENT));
        assert!(reaper.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_reaper_stops_it_but_not_the_parent() {
        let store = Arc::new(ClientStore::new(1.0, 1));
        let shutdown = CancellationToken::new();
        drop(Reaper::spawn(Arc::clone(&store), MINUTE, MINUTE, &shutdown));

        store.admit(CLIENT, Instant::now());
        tokio::time::sleep(10 * MINUTE).await;
        assert!(store.contains(&CLIENT));
        assert!(!shutdown.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_interval_is_clamped() {
        let store = Arc::new(ClientStore::new(1.0, 1));
        let shutdown = CancellationToken::new();
        let reaper = Reaper::spawn(Arc::clone(&store), Duration::MAX, MINUTE, &shutdown);

        store.admit(CLIENT, Instant::now());
        tokio::time::sleep(MAX_SWEEP_INTERVAL + MINUTE).await;
        assert!(!store.contains(&CLIENT));

        reaper.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_waits_for_the_task() {
        let store = Arc::new(ClientStore::new(1.0, 1));
        let shutdown = CancellationToken::new();
        let reaper = Reaper::spawn(store, MINUTE, MINUTE, &shutdown);

        tokio::time::timeout(Duration::from_secs(5), reaper.shutdown())
            .await
            .expect("reaper did not stop");
        assert!(!shutdown.is_cancelled());
    }
}
