//! Background task that periodically removes expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::store::QueryCache;

/// Handle to the periodic cache sweep task.
///
/// Expired entries are already dropped lazily on lookup; the sweeper
/// reclaims memory for keys that are never asked for again.
#[derive(Debug)]
pub struct CacheSweeper {
    handle: JoinHandle<()>,
    token: CancellationToken,
}

impl CacheSweeper {
    /// Spawn the sweep loop on the current runtime.
    pub fn spawn(cache: Arc<QueryCache>, interval: Duration) -> Self {
        let token = CancellationToken::new();
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick resolves immediately; skip it so sweeps
            // start one full interval after spawn.
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => {
                        debug!("cache sweeper stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let swept = cache.sweep_expired();
                        if swept > 0 {
                            debug!(swept, "swept expired cache entries");
                        }
                    }
                }
            }
        });

        Self { handle, token }
    }

    /// Stop the sweep loop and wait for it to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn short_ttl_cache() -> Arc<QueryCache> {
        let config = CacheConfig::new().with_ttl(Duration::from_millis(10));
        Arc::new(QueryCache::new(config))
    }

    #[tokio::test]
    async fn test_sweeper_removes_expired_entries() {
        let cache = short_ttl_cache();
        cache.put("stale", &1u32).unwrap();

        let sweeper = CacheSweeper::spawn(Arc::clone(&cache), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(cache.entry_count(), 0);
        assert!(cache.stats().expirations >= 1);
        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_the_loop() {
        let cache = short_ttl_cache();
        let sweeper = CacheSweeper::spawn(Arc::clone(&cache), Duration::from_millis(20));

        // Must resolve promptly rather than waiting on the next tick.
        tokio::time::timeout(Duration::from_millis(100), sweeper.shutdown())
            .await
            .unwrap();
    }
}
