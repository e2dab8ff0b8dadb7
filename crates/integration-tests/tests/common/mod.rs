//! Shared fixtures for the integration tests

#![allow(dead_code)]

use nexus_core::port::time_provider::SystemTimeProvider;
use nexus_core::port::{KeyValueStore, TimeProvider};
use nexus_infra_sqlite::{create_pool, run_migrations, SqliteKeyValueStore};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

static NEXT_DB: AtomicU32 = AtomicU32::new(0);

/// A database file that is removed (with its WAL side files) on drop
pub struct TempDb {
    pub path: PathBuf,
}

impl TempDb {
    pub fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "nexus-it-{}-{}-{}.db",
            name,
            std::process::id(),
            NEXT_DB.fetch_add(1, Ordering::SeqCst)
        ));
        Self { path }
    }

    pub fn url(&self) -> String {
        format!("sqlite://{}", self.path.display())
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

/// Open (or reopen, simulating a restart) the store behind `db`
pub async fn open_store(db: &TempDb) -> Arc<dyn KeyValueStore> {
    let pool = create_pool(&db.url()).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    Arc::new(SqliteKeyValueStore::new(pool, time_provider))
}
