// Cache Entry Domain Model

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A cached value as persisted in the durable mirror.
///
/// `created_at` is wall-clock epoch ms, `ttl_ms` the lifetime in ms.
/// The entry expires once `now - created_at > ttl_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: Value,
    pub created_at: i64,
    pub ttl_ms: i64,
}

impl CacheEntry {
    pub fn new(data: Value, created_at: i64, ttl_ms: i64) -> Self {
        Self {
            data,
            created_at,
            ttl_ms,
        }
    }

    /// Age at `now`, clamped at zero so a clock moved backwards never yields
    /// a negative age.
    pub fn age_ms(&self, now: i64) -> i64 {
        (now - self.created_at).max(0)
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.age_ms(now) > self.ttl_ms
    }

    /// Lifetime left at `now` (zero once expired)
    pub fn remaining_ms(&self, now: i64) -> i64 {
        (self.ttl_ms - self.age_ms(now)).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expiry_boundary() {
        let entry = CacheEntry::new(json!("v"), 1_000, 500);
        assert!(!entry.is_expired(1_000));
        assert!(!entry.is_expired(1_500));
        assert!(entry.is_expired(1_501));
    }

    #[test]
    fn test_remaining_lifetime() {
        let entry = CacheEntry::new(json!(1), 1_000, 500);
        assert_eq!(entry.remaining_ms(1_200), 300);
        assert_eq!(entry.remaining_ms(2_000), 0);
    }

    #[test]
    fn test_clock_rollback_does_not_extend_age() {
        let entry = CacheEntry::new(json!(1), 5_000, 500);
        assert_eq!(entry.age_ms(4_000), 0);
        assert_eq!(entry.remaining_ms(4_000), 500);
    }
}
