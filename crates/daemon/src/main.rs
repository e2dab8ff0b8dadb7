//! Nexus Field Ops AI Orchestrator - Main Entry Point

mod config;
mod telemetry;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::DaemonConfig;
use nexus_api_rpc::{RpcServer, RpcServerConfig};
use nexus_core::application::{
    shutdown_channel, CacheConfig, CacheSweeper, DispatcherConfig, ErrorClassifier, OfflineQueue,
    QueueConfig, QueueDrainTrigger, ResponseCache, TaskDispatcher,
};
use nexus_core::port::{
    connectivity_channel, AiTransport, KeyValueStore, SystemTimeProvider, TimeProvider,
    TimestampIdProvider,
};
use nexus_infra_gemini::{GeminiConfig, GeminiTransport};
use nexus_infra_sqlite::{create_pool, run_migrations, SqliteKeyValueStore};
use nexus_infra_system::{StaticLocationProvider, TcpConnectivityProbe};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging (+ optional OpenTelemetry)
    let _log_guard = telemetry::init_logging()?;
    info!("Nexus orchestrator v{} starting...", VERSION);

    // 2. Configuration
    let config = DaemonConfig::load()?;

    // 3. Durable storage
    let db_path = config.db_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    info!(db_path = %db_path.display(), "Initializing database...");

    let pool = create_pool(&format!("sqlite://{}", db_path.display()))
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 4. Dependency wiring
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let store: Arc<dyn KeyValueStore> =
        Arc::new(SqliteKeyValueStore::new(pool.clone(), time_provider.clone()));

    let cache = Arc::new(ResponseCache::with_store(
        store.clone(),
        time_provider.clone(),
        CacheConfig {
            max_entries: config.cache_max_entries,
            ..CacheConfig::default()
        },
    ));

    // Loading also recovers requests interrupted mid-replay
    let queue = Arc::new(
        OfflineQueue::load(
            store,
            Arc::new(TimestampIdProvider::new(time_provider.clone())),
            time_provider.clone(),
            QueueConfig {
                capacity: config.queue_capacity,
                ..QueueConfig::default()
            },
        )
        .await
        .context("Failed to load offline queue")?,
    );

    let classifier = Arc::new(ErrorClassifier::new(time_provider.clone()));

    let transport: Option<Arc<dyn AiTransport>> = match config.api_key() {
        Some(api_key) => {
            let gemini = GeminiTransport::new(
                GeminiConfig::new(api_key).with_base_url(config.gemini_base_url.clone()),
            )
            .context("Failed to create Gemini client")?;
            Some(Arc::new(gemini))
        }
        None => {
            warn!("No API key configured (NEXUS_GEMINI_API_KEY); AI requests will be rejected");
            None
        }
    };

    // 5. Connectivity: probe once so the dispatcher starts with a real state
    let (publisher, connectivity) = connectivity_channel(false);
    let probe = TcpConnectivityProbe::new(publisher, config.connectivity_target.clone())
        .with_interval(config.connectivity_interval());
    let online = probe.probe_once().await;
    info!(online = online, addr = %config.connectivity_target, "Initial connectivity");

    let dispatcher = Arc::new(
        TaskDispatcher::new(
            transport,
            cache.clone(),
            queue,
            classifier,
            connectivity.clone(),
            time_provider.clone(),
            DispatcherConfig {
                model: config.model.clone(),
                ..DispatcherConfig::default()
            },
        )
        .with_location(Arc::new(StaticLocationProvider::from_parts(
            config.latitude,
            config.longitude,
        ))),
    );

    // 6. Background services
    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    let probe_handle = tokio::spawn(probe.run(shutdown_rx.clone()));
    let trigger_handle = tokio::spawn(
        QueueDrainTrigger::new(dispatcher.clone(), connectivity).run(shutdown_rx.clone()),
    );
    let sweeper_handle =
        tokio::spawn(CacheSweeper::with_default_interval(cache).run(shutdown_rx));

    // 7. JSON-RPC server
    let rpc_server = RpcServer::new(RpcServerConfig::localhost(config.rpc_port), dispatcher);
    let (rpc_addr, rpc_handle) = rpc_server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(rpc_addr = %rpc_addr, "System ready. Press Ctrl+C to shutdown");

    // 8. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 9. Graceful shutdown
    shutdown_tx.shutdown();
    if let Err(e) = rpc_handle.stop() {
        warn!(error = %e, "RPC server already stopped");
    }

    let background = async {
        let _ = tokio::join!(probe_handle, trigger_handle, sweeper_handle);
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, background).await.is_err() {
        error!("Background services did not stop in time");
    }

    pool.close().await;
    telemetry::shutdown();
    info!("Shutdown complete.");

    Ok(())
}
