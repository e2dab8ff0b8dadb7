//! JSON-RPC Server
//!
//! JSON-RPC 2.0 over HTTP on localhost.

use crate::handler::RpcHandler;
use crate::types::{ExecuteRequest, RequestIdParams};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use nexus_core::application::TaskDispatcher;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

// Localhost only: the queue holds field data and there is no auth layer
const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 9627;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

impl RpcServerConfig {
    /// Localhost on `port` (0 picks a free port)
    pub fn localhost(port: u16) -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, dispatcher: Arc<TaskDispatcher>) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(dispatcher)),
        }
    }

    /// Start the JSON-RPC server
    ///
    /// Returns the bound address and the handle used to stop it.
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let module = self.build_module()?;

        info!(addr = %local_addr, "JSON-RPC server started (localhost only)");

        let handle = server.start(module);
        Ok((local_addr, handle))
    }

    fn build_module(&self) -> Result<RpcModule<()>, String> {
        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module.register_async_method("ai.execute.v1", move |params, _, _| {
            let handler = handler.clone();
            async move {
                let req: ExecuteRequest = params.parse()?;
                handler.execute(req).await
            }
        })
        .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module.register_async_method("queue.list.v1", move |_, _, _| {
            let handler = handler.clone();
            async move { handler.queue_list().await }
        })
        .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module.register_async_method("queue.pending_count.v1", move |_, _, _| {
            let handler = handler.clone();
            async move { handler.queue_pending_count().await }
        })
        .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module.register_async_method("queue.retry.v1", move |params, _, _| {
            let handler = handler.clone();
            async move {
                let req: RequestIdParams = params.parse()?;
                handler.queue_retry(req).await
            }
        })
        .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module.register_async_method("queue.retry_all.v1", move |_, _, _| {
            let handler = handler.clone();
            async move { handler.queue_retry_all().await }
        })
        .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module.register_async_method("queue.remove.v1", move |params, _, _| {
            let handler = handler.clone();
            async move {
                let req: RequestIdParams = params.parse()?;
                handler.queue_remove(req).await
            }
        })
        .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module.register_async_method("queue.clear.v1", move |_, _, _| {
            let handler = handler.clone();
            async move { handler.queue_clear().await }
        })
        .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module.register_async_method("queue.process.v1", move |_, _, _| {
            let handler = handler.clone();
            async move { handler.queue_process().await }
        })
        .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module.register_async_method("cache.clear.v1", move |_, _, _| {
            let handler = handler.clone();
            async move { handler.cache_clear().await }
        })
        .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module.register_async_method("admin.stats.v1", move |_, _, _| {
            let handler = handler.clone();
            async move { handler.stats().await }
        })
        .map_err(|e| e.to_string())?;

        Ok(module)
    }
}
