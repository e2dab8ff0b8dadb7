// Response Cache Store
// Read-through/write-through decorator over an in-memory tier and a durable mirror

mod durable;
mod memory;

pub use durable::DurableCacheLayer;
pub use memory::MemoryCacheLayer;

use crate::application::constants::{
    CACHE_STORAGE_PREFIX, DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL,
};
use crate::error::Result;
use crate::port::{KeyValueStore, TimeProvider};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of a tier lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Hit { data: Value, remaining: Duration },
    Expired,
    Miss,
}

/// Entry count and approximate footprint of one tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerStats {
    pub entries: usize,
    pub bytes: usize,
}

/// One storage tier of the cache
///
/// Implementations:
/// - MemoryCacheLayer: bounded map with monotonic deadlines
/// - DurableCacheLayer: entries mirrored into a KeyValueStore
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Look up `key`; an expired entry is reported as `Lookup::Expired`
    async fn load(&self, key: &str) -> Result<Lookup>;

    /// Insert or overwrite `key`, expiring `ttl` from now
    async fn store(&self, key: &str, data: Value, ttl: Duration) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;

    /// Drop every expired entry, returning how many were removed
    async fn purge_expired(&self) -> Result<usize>;

    async fn stats(&self) -> Result<LayerStats>;
}

/// Cache tunables
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub default_ttl: Duration,
    pub storage_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            default_ttl: DEFAULT_CACHE_TTL,
            storage_prefix: CACHE_STORAGE_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub durable_entries: usize,
    pub durable_bytes: usize,
}

/// Tiered cache
///
/// The memory tier is authoritative for the session. Every durable read or
/// write is best-effort: failures are logged and never reach the caller.
pub struct ResponseCache {
    memory: Arc<dyn CacheLayer>,
    durable: Option<Arc<dyn CacheLayer>>,
    default_ttl: Duration,
}

impl ResponseCache {
    pub fn new(
        memory: Arc<dyn CacheLayer>,
        durable: Option<Arc<dyn CacheLayer>>,
        default_ttl: Duration,
    ) -> Self {
        Self {
            memory,
            durable,
            default_ttl,
        }
    }

    /// Memory tier plus a durable mirror in `store`
    pub fn with_store(
        store: Arc<dyn KeyValueStore>,
        time_provider: Arc<dyn TimeProvider>,
        config: CacheConfig,
    ) -> Self {
        let memory: Arc<dyn CacheLayer> = Arc::new(MemoryCacheLayer::new(config.max_entries));
        let durable: Arc<dyn CacheLayer> = Arc::new(DurableCacheLayer::new(
            store,
            time_provider,
            config.storage_prefix,
        ));
        Self::new(memory, Some(durable), config.default_ttl)
    }

    /// Memory tier only (nothing survives a restart)
    pub fn memory_only(config: CacheConfig) -> Self {
        Self::new(
            Arc::new(MemoryCacheLayer::new(config.max_entries)),
            None,
            config.default_ttl,
        )
    }

    /// Deterministic key: `{namespace}_{sha256 hex of the JSON params}`
    ///
    /// JSON objects serialize with sorted keys, so equal params always
    /// produce the same key.
    pub fn derive_key(namespace: &str, params: &Value) -> String {
        let digest = Sha256::digest(params.to_string().as_bytes());
        format!("{}_{:x}", namespace, digest)
    }

    /// Store `value` under `key` (default TTL when `ttl` is None)
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let data = match serde_json::to_value(value) {
            Ok(data) => data,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache value not serializable, skipping");
                return;
            }
        };

        if let Err(e) = self.memory.store(key, data.clone(), ttl).await {
            warn!(key = %key, error = %e, "Memory cache write failed");
        }

        if let Some(durable) = &self.durable {
            if let Err(e) = durable.store(key, data, ttl).await {
                warn!(key = %key, error = %e, "Durable cache write failed");
            }
        }

        debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "Cache set");
    }

    /// Read `key`, hydrating the memory tier from the durable mirror on a miss
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let data = self.lookup(key).await?;
        match serde_json::from_value(data) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Cached value has unexpected shape, dropping");
                self.delete(key).await;
                None
            }
        }
    }

    pub async fn has(&self, key: &str) -> bool {
        self.lookup(key).await.is_some()
    }

    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.memory.remove(key).await {
            warn!(key = %key, error = %e, "Memory cache delete failed");
        }
        self.remove_durable(key).await;
    }

    pub async fn clear(&self) {
        if let Err(e) = self.memory.clear().await {
            warn!(error = %e, "Memory cache clear failed");
        }
        if let Some(durable) = &self.durable {
            if let Err(e) = durable.clear().await {
                warn!(error = %e, "Durable cache clear failed");
            }
        }
    }

    /// Sweep both tiers, returning the number of entries removed
    pub async fn clear_expired(&self) -> usize {
        let mut removed = match self.memory.purge_expired().await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Memory cache sweep failed");
                0
            }
        };
        if let Some(durable) = &self.durable {
            match durable.purge_expired().await {
                Ok(n) => removed += n,
                Err(e) => warn!(error = %e, "Durable cache sweep failed"),
            }
        }
        removed
    }

    pub async fn stats(&self) -> CacheStats {
        let memory = self.memory.stats().await.unwrap_or_default();
        let durable = match &self.durable {
            Some(durable) => durable.stats().await.unwrap_or_else(|e| {
                warn!(error = %e, "Durable cache stats unavailable");
                LayerStats::default()
            }),
            None => LayerStats::default(),
        };
        CacheStats {
            memory_entries: memory.entries,
            durable_entries: durable.entries,
            durable_bytes: durable.bytes,
        }
    }

    async fn lookup(&self, key: &str) -> Option<Value> {
        match self.memory.load(key).await {
            Ok(Lookup::Hit { data, .. }) => return Some(data),
            Ok(Lookup::Expired) => {
                // Memory tier already dropped it; the mirror shares the deadline
                self.remove_durable(key).await;
                return None;
            }
            Ok(Lookup::Miss) => {}
            Err(e) => warn!(key = %key, error = %e, "Memory cache read failed"),
        }

        let durable = self.durable.as_ref()?;
        match durable.load(key).await {
            Ok(Lookup::Hit { data, remaining }) => {
                debug!(key = %key, remaining_ms = remaining.as_millis() as u64, "Hydrated from durable cache");
                if let Err(e) = self.memory.store(key, data.clone(), remaining).await {
                    warn!(key = %key, error = %e, "Memory cache hydration failed");
                }
                Some(data)
            }
            Ok(Lookup::Expired) => {
                self.remove_durable(key).await;
                None
            }
            Ok(Lookup::Miss) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Durable cache read failed");
                None
            }
        }
    }

    async fn remove_durable(&self, key: &str) {
        if let Some(durable) = &self.durable {
            if let Err(e) = durable.remove(key).await {
                warn!(key = %key, error = %e, "Durable cache delete failed");
            }
        }
    }
}
