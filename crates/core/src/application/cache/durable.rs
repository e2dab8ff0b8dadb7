// Durable cache mirror over a KeyValueStore

use super::{CacheLayer, LayerStats, Lookup};
use crate::domain::CacheEntry;
use crate::error::Result;
use crate::port::{KeyValueStore, TimeProvider};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Cache tier persisted as JSON `CacheEntry` records
///
/// Expiry is judged against the wall clock because the monotonic clock does
/// not survive a restart.
pub struct DurableCacheLayer {
    store: Arc<dyn KeyValueStore>,
    time_provider: Arc<dyn TimeProvider>,
    prefix: String,
}

impl DurableCacheLayer {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        time_provider: Arc<dyn TimeProvider>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            time_provider,
            prefix: prefix.into(),
        }
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl CacheLayer for DurableCacheLayer {
    async fn load(&self, key: &str) -> Result<Lookup> {
        let Some(raw) = self.store.get(&self.storage_key(key)).await? else {
            return Ok(Lookup::Miss);
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, error = %e, "Corrupt durable cache entry ignored");
                return Ok(Lookup::Miss);
            }
        };

        let now = self.time_provider.now_millis();
        if entry.is_expired(now) {
            return Ok(Lookup::Expired);
        }

        Ok(Lookup::Hit {
            remaining: Duration::from_millis(entry.remaining_ms(now) as u64),
            data: entry.data,
        })
    }

    async fn store(&self, key: &str, data: Value, ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(data, self.time_provider.now_millis(), ttl.as_millis() as i64);
        let raw = serde_json::to_string(&entry)?;
        self.store.set(&self.storage_key(key), &raw).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.store.remove(&self.storage_key(key)).await
    }

    async fn clear(&self) -> Result<()> {
        for key in self.store.keys_with_prefix(&self.prefix).await? {
            self.store.remove(&key).await?;
        }
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = self.time_provider.now_millis();
        let mut removed = 0;

        for key in self.store.keys_with_prefix(&self.prefix).await? {
            let Some(raw) = self.store.get(&key).await? else {
                continue;
            };

            let stale = match serde_json::from_str::<CacheEntry>(&raw) {
                Ok(entry) => entry.is_expired(now),
                Err(_) => {
                    debug!(key = %key, "Removing corrupt durable cache entry");
                    true
                }
            };

            if stale {
                self.store.remove(&key).await?;
                removed += 1;
            }
        }

        Ok(removed)
    }

    async fn stats(&self) -> Result<LayerStats> {
        let mut stats = LayerStats::default();
        for key in self.store.keys_with_prefix(&self.prefix).await? {
            if let Some(raw) = self.store.get(&key).await? {
                stats.entries += 1;
                stats.bytes += key.len() + raw.len();
            }
        }
        Ok(stats)
    }
}
