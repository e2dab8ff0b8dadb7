// In-memory cache tier

use super::{CacheLayer, LayerStats, Lookup};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

struct Slot {
    data: Value,
    deadline: Instant,
}

#[derive(Default)]
struct Inner {
    slots: HashMap<String, Slot>,
    /// Insertion order, oldest first
    order: VecDeque<String>,
}

impl Inner {
    fn remove(&mut self, key: &str) -> bool {
        if self.slots.remove(key).is_some() {
            self.order.retain(|k| k != key);
            true
        } else {
            false
        }
    }
}

/// Bounded map with FIFO eviction and monotonic deadlines
///
/// Deadlines use `tokio::time::Instant`, so wall-clock changes during a
/// session never revive an expired entry.
pub struct MemoryCacheLayer {
    max_entries: usize,
    inner: Mutex<Inner>,
}

impl MemoryCacheLayer {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }
}

#[async_trait]
impl CacheLayer for MemoryCacheLayer {
    async fn load(&self, key: &str) -> Result<Lookup> {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;

        let Some(slot) = inner.slots.get(key) else {
            return Ok(Lookup::Miss);
        };

        if now > slot.deadline {
            inner.remove(key);
            return Ok(Lookup::Expired);
        }

        Ok(Lookup::Hit {
            data: slot.data.clone(),
            remaining: slot.deadline - now,
        })
    }

    async fn store(&self, key: &str, data: Value, ttl: Duration) -> Result<()> {
        let deadline = Instant::now() + ttl;
        let mut inner = self.inner.lock().await;

        // Overwrite counts as a fresh insertion
        inner.remove(key);

        while inner.slots.len() >= self.max_entries {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.slots.remove(&oldest);
            debug!(key = %oldest, "Evicted oldest cache entry");
        }

        inner.slots.insert(key.to_string(), Slot { data, deadline });
        inner.order.push_back(key.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.inner.lock().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.slots.clear();
        inner.order.clear();
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;

        let expired: Vec<String> = inner
            .slots
            .iter()
            .filter(|(_, slot)| now > slot.deadline)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.remove(key);
        }
        Ok(expired.len())
    }

    async fn stats(&self) -> Result<LayerStats> {
        let inner = self.inner.lock().await;
        Ok(LayerStats {
            entries: inner.slots.len(),
            bytes: inner
                .slots
                .iter()
                .map(|(key, slot)| key.len() + slot.data.to_string().len())
                .sum(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_remaining_shrinks_with_time() {
        let layer = MemoryCacheLayer::new(4);
        layer.store("k", json!(1), Duration::from_secs(10)).await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        match layer.load("k").await.unwrap() {
            Lookup::Hit { remaining, .. } => assert_eq!(remaining, Duration::from_secs(6)),
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_dropped_on_read() {
        let layer = MemoryCacheLayer::new(4);
        layer.store("k", json!(1), Duration::from_secs(1)).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(layer.load("k").await.unwrap(), Lookup::Expired);
        assert_eq!(layer.load("k").await.unwrap(), Lookup::Miss);
        assert_eq!(layer.stats().await.unwrap().entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_moves_key_to_back() {
        let layer = MemoryCacheLayer::new(2);
        let ttl = Duration::from_secs(60);
        layer.store("a", json!(1), ttl).await.unwrap();
        layer.store("b", json!(2), ttl).await.unwrap();
        layer.store("a", json!(10), ttl).await.unwrap();
        layer.store("c", json!(3), ttl).await.unwrap();

        assert_eq!(layer.load("b").await.unwrap(), Lookup::Miss);
        assert!(matches!(layer.load("a").await.unwrap(), Lookup::Hit { data, .. } if data == json!(10)));
        assert!(matches!(layer.load("c").await.unwrap(), Lookup::Hit { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_counts_removals() {
        let layer = MemoryCacheLayer::new(8);
        layer.store("short", json!(1), Duration::from_secs(1)).await.unwrap();
        layer.store("long", json!(2), Duration::from_secs(100)).await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(layer.purge_expired().await.unwrap(), 1);
        assert_eq!(layer.stats().await.unwrap().entries, 1);
    }
}
