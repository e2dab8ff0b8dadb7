// ID Provider Port (for deterministic testing)

use crate::port::TimeProvider;
use rand::Rng;
use std::sync::Arc;

const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// ID provider interface (allows deterministic IDs in tests)
pub trait IdProvider: Send + Sync {
    /// Generate a new unique request ID
    fn generate_id(&self) -> String;
}

/// `{epoch_ms}_{9 random base36 chars}` (production)
///
/// Unique within a session; no cross-device guarantee.
pub struct TimestampIdProvider {
    time_provider: Arc<dyn TimeProvider>,
}

impl TimestampIdProvider {
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self { time_provider }
    }
}

impl IdProvider for TimestampIdProvider {
    fn generate_id(&self) -> String {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..ID_SUFFIX_LEN)
            .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
            .collect();
        format!("{}_{}", self.time_provider.now_millis(), suffix)
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Sequential IDs: `req-1`, `req-2`, ...
    #[derive(Default)]
    pub struct SequentialIdProvider {
        next: AtomicU64,
    }
    impl SequentialIdProvider {
        pub fn new() -> Self {
            Self::default()
        }
    }
    impl IdProvider for SequentialIdProvider {
        fn generate_id(&self) -> String {
            format!("req-{}", self.next.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }
}
