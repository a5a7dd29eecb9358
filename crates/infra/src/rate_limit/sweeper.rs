use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use super::RateLimiter;

/// Handle to stop and join the background sweep.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Request shutdown and wait for the sweep task to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}

impl RateLimiter {
    /// Sweep idle buckets every retention window until shut down.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let limiter = Arc::clone(self);
        let period = self.retention;

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let evicted = limiter.sweep(Instant::now());
                        if evicted > 0 {
                            let remaining = limiter.bucket_count();
                            debug!(evicted, remaining, "rate-limit buckets swept");
                        }
                    }
                }
            }
            debug!("rate-limit sweeper stopped");
        });

        SweeperHandle {
            shutdown: Some(shutdown_tx),
            join: Some(join),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::rate_limit::{BucketKey, BucketPolicy};

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_idle_buckets_on_its_own() {
        let limiter = Arc::new(RateLimiter::new(
            BucketPolicy::per_minute(60, 20),
            Duration::from_secs(10),
        ));
        let handle = limiter.spawn_sweeper();
        settle().await;

        limiter.check(&BucketKey::new("10.0.0.1", "/cards"));
        assert_eq!(limiter.bucket_count(), 1);

        // First sweep at t=10s: idle for exactly the window, kept.
        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(limiter.bucket_count(), 1);

        // Second sweep at t=20s: idle past the window, gone.
        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(limiter.bucket_count(), 0);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retention_still_gets_a_sweep_period() {
        let limiter = Arc::new(RateLimiter::new(BucketPolicy::per_minute(60, 20), Duration::ZERO));
        assert_eq!(limiter.retention(), Duration::from_secs(600));

        let handle = limiter.spawn_sweeper();
        settle().await;
        limiter.check(&BucketKey::new("10.0.0.1", "/cards"));

        tokio::time::advance(Duration::from_secs(1200)).await;
        settle().await;
        assert_eq!(limiter.bucket_count(), 0);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_loop() {
        let limiter = Arc::new(RateLimiter::new(
            BucketPolicy::per_minute(60, 20),
            Duration::from_secs(10),
        ));
        let handle = limiter.spawn_sweeper();
        handle.shutdown().await;

        limiter.check(&BucketKey::new("10.0.0.1", "/cards"));
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(limiter.bucket_count(), 1);
        assert_eq!(Arc::strong_count(&limiter), 1);
    }
}
