// Cache Sweeper
// The only scheduled maintenance: periodic removal of expired cache entries

use crate::application::cache::ResponseCache;
use crate::application::constants::CACHE_SWEEP_INTERVAL;
use crate::application::shutdown::ShutdownToken;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Periodic `clear_expired` on the response cache
pub struct CacheSweeper {
    cache: Arc<ResponseCache>,
    interval: Duration,
}

impl CacheSweeper {
    /// # Arguments
    /// * `cache` - Cache to sweep
    /// * `interval` - Time between sweeps (first sweep one interval after start)
    pub fn new(cache: Arc<ResponseCache>, interval: Duration) -> Self {
        Self { cache, interval }
    }

    pub fn with_default_interval(cache: Arc<ResponseCache>) -> Self {
        Self::new(cache, CACHE_SWEEP_INTERVAL)
    }

    /// Run sweep loop until shutdown (should be spawned in tokio::spawn)
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Cache sweeper started"
        );

        let mut tick = interval_at(Instant::now() + self.interval, self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.wait() => {
                    info!("Cache sweeper shutting down");
                    break;
                }
                _ = tick.tick() => {
                    self.run_now().await;
                }
            }
        }
    }

    /// Sweep immediately, returning the number of entries removed
    pub async fn run_now(&self) -> usize {
        let removed = self.cache.clear_expired().await;
        if removed > 0 {
            info!(removed = removed, "Expired cache entries swept");
        } else {
            debug!("Cache sweep found nothing to remove");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::cache::CacheConfig;
    use crate::application::shutdown::shutdown_channel;

    #[tokio::test(start_paused = true)]
    async fn test_sweeps_on_interval() {
        let cache = Arc::new(ResponseCache::memory_only(CacheConfig::default()));
        cache.set("short", &1, Some(Duration::from_secs(1))).await;
        cache.set("long", &2, Some(Duration::from_secs(3600))).await;

        let (shutdown, token) = shutdown_channel();
        let handle = tokio::spawn(CacheSweeper::with_default_interval(cache.clone()).run(token));

        tokio::time::sleep(CACHE_SWEEP_INTERVAL / 2).await;
        assert_eq!(cache.stats().await.memory_entries, 2);

        tokio::time::sleep(CACHE_SWEEP_INTERVAL).await;
        assert_eq!(cache.stats().await.memory_entries, 1);

        shutdown.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_now() {
        let cache = Arc::new(ResponseCache::memory_only(CacheConfig::default()));
        cache.set("k", &1, Some(Duration::from_millis(10))).await;
        tokio::time::advance(Duration::from_secs(1)).await;

        let sweeper = CacheSweeper::new(cache, Duration::from_secs(60));
        assert_eq!(sweeper.run_now().await, 1);
        assert_eq!(sweeper.run_now().await, 0);
    }
}
