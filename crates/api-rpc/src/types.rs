//! RPC Request/Response Types
//!
//! JSON-RPC method parameters and results.

use nexus_core::application::constants::DEFAULT_MAX_RETRIES;
use nexus_core::application::{CacheStats, DrainReport, ErrorStats, QueueStats};
use nexus_core::domain::QueuedRequest;
use serde::{Deserialize, Serialize};

/// ai.execute.v1 - Run one AI task
///
/// The result is the `AiResponse` itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub prompt: String,
    pub task_type: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_use_cache() -> bool {
    true
}

/// queue.list.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueListResponse {
    pub requests: Vec<QueuedRequest>,
}

/// queue.pending_count.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingCountResponse {
    pub pending: usize,
}

/// queue.retry.v1 / queue.remove.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestIdParams {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryResponse {
    pub id: String,
    pub retried: bool,
}

/// queue.retry_all.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryAllResponse {
    pub retried: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveResponse {
    pub id: String,
    pub removed: bool,
}

/// queue.clear.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearQueueResponse {
    pub cleared: usize,
}

/// queue.process.v1 - either a drain report or why nothing ran
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessQueueResponse {
    Completed(DrainReport),
    Skipped { skipped: String },
}

/// cache.clear.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearCacheResponse {
    pub cleared: bool,
}

/// admin.stats.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub queue: QueueStats,
    pub cache: CacheStats,
    pub errors: ErrorStats,
    pub failure_count: u64,
    pub needs_escalation: bool,
    pub online: bool,
    pub configured: bool,
    pub model: String,
    pub uptime_seconds: u64,
}
