//! Background eviction of idle buckets.
//!
//! The sweeper wakes once per cleanup interval and removes every bucket that
//! has been idle for longer than that same interval. This bounds the
//! registry to roughly the callers seen within one window.
//!
//! The task is bound to a [`CancellationToken`]: cancelling it stops the
//! ticker, and [`Sweeper::shutdown`] waits for an in-progress pass to finish.

use std::sync::Arc;
use std::time::Duration;

use governor::clock::Clock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use turnstile_core::domain::{AdmissionPolicy, EvictionMode};

use super::registry::BucketRegistry;

/// Configuration for the sweeper task.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Period between passes; also the idle threshold.
    pub interval: Duration,
    pub eviction: EvictionMode,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self::from(&AdmissionPolicy::default())
    }
}

impl From<&AdmissionPolicy> for SweeperConfig {
    fn from(policy: &AdmissionPolicy) -> Self {
        Self {
            interval: policy.cleanup_interval,
            eviction: policy.eviction,
        }
    }
}

/// Handle to the running sweeper task.
pub struct Sweeper {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn the sweeper on the current tokio runtime.
    ///
    /// The task stops when `cancel` (or a parent of it) is cancelled.
    pub fn spawn<C>(
        registry: Arc<BucketRegistry<C>>,
        config: SweeperConfig,
        cancel: CancellationToken,
    ) -> Self
    where
        C: Clock + Send + Sync + 'static,
    {
        let handle = tokio::spawn(run_sweep_loop(registry, config, cancel.clone()));
        Self { cancel, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the ticker and wait for the task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Sweeper task ended abnormally");
        }
    }
}

async fn run_sweep_loop<C>(
    registry: Arc<BucketRegistry<C>>,
    config: SweeperConfig,
    cancel: CancellationToken,
) where
    C: Clock + Send + Sync + 'static,
{
    // First pass one full interval after start; nothing can be idle before then.
    let mut ticker = interval_at(Instant::now() + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        interval_secs = config.interval.as_secs(),
        eviction = ?config.eviction,
        "Sweeper started"
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Sweeper shutting down");
                break;
            }
            _ = ticker.tick() => {
                let stats = registry.sweep(config.interval, config.eviction);
                if stats.evicted > 0 {
                    info!(
                        evicted = stats.evicted,
                        remaining = stats.remaining,
                        "Evicted idle rate limit buckets"
                    );
                } else {
                    debug!(remaining = stats.remaining, "Sweep found no idle buckets");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor::clock::FakeRelativeClock;

    const INTERVAL: Duration = Duration::from_secs(60);

    fn setup() -> (Arc<BucketRegistry<FakeRelativeClock>>, FakeRelativeClock) {
        let clock = FakeRelativeClock::default();
        let registry = Arc::new(BucketRegistry::with_clock(20.0, 10.0, clock.clone()));
        (registry, clock)
    }

    fn config() -> SweeperConfig {
        SweeperConfig {
            interval: INTERVAL,
            eviction: EvictionMode::Idle,
        }
    }

    #[test]
    fn test_config_from_policy() {
        let config = SweeperConfig::default();
        assert_eq!(config.interval, Duration::from_secs(300));
        assert_eq!(config.eviction, EvictionMode::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_bucket_evicted_on_next_tick() {
        let (registry, clock) = setup();
        registry.check("A");

        let sweeper = Sweeper::spawn(registry.clone(), config(), CancellationToken::new());

        clock.advance(INTERVAL + Duration::from_secs(1));
        tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;

        assert!(registry.is_empty());
        sweeper.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_recent_bucket_survives_tick() {
        let (registry, clock) = setup();
        registry.check("A");

        let sweeper = Sweeper::spawn(registry.clone(), config(), CancellationToken::new());

        clock.advance(Duration::from_secs(30));
        tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;

        assert!(registry.contains("A"));
        sweeper.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_sweep_before_first_interval() {
        let (registry, clock) = setup();
        registry.check("A");

        let sweeper = Sweeper::spawn(registry.clone(), config(), CancellationToken::new());

        clock.advance(Duration::from_secs(3600));
        tokio::time::sleep(INTERVAL / 2).await;

        assert!(registry.contains("A"));
        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_task() {
        let (registry, _clock) = setup();
        let sweeper = Sweeper::spawn(registry, config(), CancellationToken::new());
        assert!(sweeper.is_running());

        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn test_parent_token_cancels_sweeper() {
        let (registry, _clock) = setup();
        let parent = CancellationToken::new();
        let sweeper = Sweeper::spawn(registry, config(), parent.child_token());

        parent.cancel();
        tokio::time::timeout(Duration::from_secs(5), async {
            while sweeper.is_running() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("sweeper should stop after parent cancellation");
    }
}
