// Nexus Infrastructure - SQLite Adapter
// Implements: KeyValueStore (cache mirror + offline queue snapshot)

mod connection;
mod error;
mod kv_store;
mod migration;

pub use connection::create_pool;
pub use kv_store::SqliteKeyValueStore;
pub use migration::run_migrations;
