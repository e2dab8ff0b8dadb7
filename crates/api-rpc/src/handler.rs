//! RPC Method Handlers
//!
//! Thin adapters from JSON-RPC params to the task dispatcher and its services.

use crate::error::to_rpc_error;
use crate::types::{
    ClearCacheResponse, ClearQueueResponse, ExecuteRequest, PendingCountResponse,
    ProcessQueueResponse, QueueListResponse, RemoveResponse, RequestIdParams, RetryAllResponse,
    RetryResponse, StatsResponse,
};
use jsonrpsee::types::ErrorObjectOwned;
use nexus_core::application::{ReplayOutcome, TaskDispatcher, TaskRequest};
use nexus_core::domain::{AiResponse, TaskType};
use nexus_core::error::AppError;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    dispatcher: Arc<TaskDispatcher>,
    start_time: Instant,
}

impl RpcHandler {
    pub fn new(dispatcher: Arc<TaskDispatcher>) -> Self {
        Self {
            dispatcher,
            start_time: Instant::now(),
        }
    }

    /// ai.execute.v1
    pub async fn execute(&self, params: ExecuteRequest) -> Result<AiResponse, ErrorObjectOwned> {
        let task_type: TaskType = params
            .task_type
            .parse()
            .map_err(|e| to_rpc_error(AppError::Domain(e)))?;

        let mut request = TaskRequest::new(params.prompt, task_type).with_max_retries(params.max_retries);
        if !params.use_cache {
            request = request.without_cache();
        }
        if let Some(context) = params.context {
            request = request.with_context(context);
        }

        Ok(self.dispatcher.execute_task(request).await)
    }

    /// queue.list.v1
    pub async fn queue_list(&self) -> Result<QueueListResponse, ErrorObjectOwned> {
        Ok(QueueListResponse {
            requests: self.dispatcher.queue().list().await,
        })
    }

    /// queue.pending_count.v1
    pub async fn queue_pending_count(&self) -> Result<PendingCountResponse, ErrorObjectOwned> {
        Ok(PendingCountResponse {
            pending: self.dispatcher.queue().pending_count().await,
        })
    }

    /// queue.retry.v1
    pub async fn queue_retry(
        &self,
        params: RequestIdParams,
    ) -> Result<RetryResponse, ErrorObjectOwned> {
        let retried = self
            .dispatcher
            .queue()
            .retry(&params.id)
            .await
            .map_err(to_rpc_error)?;

        Ok(RetryResponse {
            id: params.id,
            retried,
        })
    }

    /// queue.retry_all.v1
    pub async fn queue_retry_all(&self) -> Result<RetryAllResponse, ErrorObjectOwned> {
        let retried = self
            .dispatcher
            .queue()
            .retry_all()
            .await
            .map_err(to_rpc_error)?;
        Ok(RetryAllResponse { retried })
    }

    /// queue.remove.v1
    pub async fn queue_remove(
        &self,
        params: RequestIdParams,
    ) -> Result<RemoveResponse, ErrorObjectOwned> {
        let removed = self
            .dispatcher
            .queue()
            .remove(&params.id)
            .await
            .map_err(to_rpc_error)?;

        Ok(RemoveResponse {
            id: params.id,
            removed,
        })
    }

    /// queue.clear.v1
    pub async fn queue_clear(&self) -> Result<ClearQueueResponse, ErrorObjectOwned> {
        let cleared = self
            .dispatcher
            .queue()
            .clear_all()
            .await
            .map_err(to_rpc_error)?;

        info!(cleared = cleared, "Offline queue cleared via RPC");
        Ok(ClearQueueResponse { cleared })
    }

    /// queue.process.v1
    pub async fn queue_process(&self) -> Result<ProcessQueueResponse, ErrorObjectOwned> {
        Ok(match self.dispatcher.process_offline_queue().await {
            ReplayOutcome::Completed(report) => ProcessQueueResponse::Completed(report),
            ReplayOutcome::Skipped(reason) => ProcessQueueResponse::Skipped {
                skipped: reason.as_str().to_string(),
            },
        })
    }

    /// cache.clear.v1
    pub async fn cache_clear(&self) -> Result<ClearCacheResponse, ErrorObjectOwned> {
        self.dispatcher.cache().clear().await;
        info!("Response cache cleared via RPC");
        Ok(ClearCacheResponse { cleared: true })
    }

    /// admin.stats.v1
    pub async fn stats(&self) -> Result<StatsResponse, ErrorObjectOwned> {
        Ok(StatsResponse {
            queue: self.dispatcher.queue().stats().await,
            cache: self.dispatcher.cache().stats().await,
            errors: self.dispatcher.classifier().stats(),
            failure_count: self.dispatcher.failure_count(),
            needs_escalation: self.dispatcher.needs_escalation(),
            online: self.dispatcher.is_online(),
            configured: self.dispatcher.is_configured(),
            model: self.dispatcher.model().to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        })
    }
}

// ============================================================================
// Test Fixtures
// ============================================================================

#[cfg(test)]
pub(crate) mod fixtures {
    use nexus_core::application::{
        CacheConfig, DispatcherConfig, ErrorClassifier, OfflineQueue, QueueConfig,
        ResponseCache, TaskDispatcher,
    };
    use nexus_core::port::ai_transport::mocks::MockTransport;
    use nexus_core::port::id_provider::mocks::SequentialIdProvider;
    use nexus_core::port::key_value_store::mocks::MemoryKeyValueStore;
    use nexus_core::port::time_provider::mocks::MockTimeProvider;
    use nexus_core::port::{connectivity_channel, AiTransport, ConnectivityPublisher};
    use std::sync::Arc;
    use std::time::Duration;

    pub struct Fixture {
        pub dispatcher: Arc<TaskDispatcher>,
        pub transport: Arc<MockTransport>,
        pub publisher: ConnectivityPublisher,
    }

    pub async fn fixture(transport: MockTransport, online: bool) -> Fixture {
        let store = Arc::new(MemoryKeyValueStore::new());
        let clock = Arc::new(MockTimeProvider::new(1_700_000_000_000));
        let cache = Arc::new(ResponseCache::with_store(
            store.clone(),
            clock.clone(),
            CacheConfig::default(),
        ));
        let queue = Arc::new(
            OfflineQueue::load(
                store,
                Arc::new(SequentialIdProvider::new()),
                clock.clone(),
                QueueConfig::default(),
            )
            .await
            .unwrap(),
        );
        let classifier = Arc::new(ErrorClassifier::new(clock.clone()));
        let (publisher, watch) = connectivity_channel(online);
        let transport = Arc::new(transport);

        // Real-time tests: no pacing or backoff delays
        let config = DispatcherConfig {
            min_request_interval: Duration::ZERO,
            backoff_base_delay: Duration::ZERO,
            backoff_max_delay: Duration::ZERO,
            ..DispatcherConfig::default()
        };

        let dispatcher = Arc::new(TaskDispatcher::new(
            Some(transport.clone() as Arc<dyn AiTransport>),
            cache,
            queue,
            classifier,
            watch,
            clock,
            config,
        ));

        Fixture {
            dispatcher,
            transport,
            publisher,
        }
    }
}
