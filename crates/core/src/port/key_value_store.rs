// Durable Key/Value Storage Port
// Backs the cache mirror and the offline queue snapshot

use crate::error::Result;
use async_trait::async_trait;

/// Device-local string store
///
/// Implementations:
/// - SqliteKeyValueStore (infra-sqlite)
/// - MemoryKeyValueStore (tests)
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or overwrite `key`
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key` (no-op if absent)
    async fn remove(&self, key: &str) -> Result<()>;

    /// All keys starting with `prefix`, in ascending order
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory store with switchable write failures
    #[derive(Default)]
    pub struct MemoryKeyValueStore {
        entries: Mutex<BTreeMap<String, String>>,
        fail_writes: AtomicBool,
        fail_reads: AtomicBool,
    }
    impl MemoryKeyValueStore {
        pub fn new() -> Self {
            Self::default()
        }
        /// Make every subsequent set/remove fail with a storage error
        pub fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }
        /// Make every subsequent get/keys_with_prefix fail with a storage error
        pub fn fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }
        /// Write directly, bypassing failure injection
        pub fn insert_raw(&self, key: &str, value: &str) {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
        }
        pub fn raw(&self, key: &str) -> Option<String> {
            self.entries.lock().unwrap().get(key).cloned()
        }
        pub fn len(&self) -> usize {
            self.entries.lock().unwrap().len()
        }
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
        fn check_write(&self) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(AppError::Storage("storage quota exceeded".to_string()));
            }
            Ok(())
        }
        fn check_read(&self) -> Result<()> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(AppError::Storage("storage unavailable".to_string()));
            }
            Ok(())
        }
    }
    #[async_trait]
    impl KeyValueStore for MemoryKeyValueStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.check_read()?;
            Ok(self.raw(key))
        }
        async fn set(&self, key: &str, value: &str) -> Result<()> {
            self.check_write()?;
            self.insert_raw(key, value);
            Ok(())
        }
        async fn remove(&self, key: &str) -> Result<()> {
            self.check_write()?;
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }
        async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
            self.check_read()?;
            Ok(self
                .entries
                .lock()
                .unwrap()
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect())
        }
    }
}
