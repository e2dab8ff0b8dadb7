// Application Layer - Use Cases and Business Logic

pub mod cache;
pub mod classifier;
pub mod constants;
pub mod dispatcher;
pub mod drain_trigger;
pub mod maintenance;
pub mod offline_queue;
pub mod panic_guard;
pub mod rate_gate;
pub mod retry;
pub mod shutdown;

// Re-exports
pub use cache::{CacheConfig, CacheStats, ResponseCache};
pub use classifier::{classify_failure, CaughtFailure, ErrorClassifier, ErrorStats};
pub use dispatcher::{
    DispatcherConfig, EscalationTracker, ReplayOutcome, SkipReason, TaskDispatcher, TaskRequest,
};
pub use drain_trigger::QueueDrainTrigger;
pub use maintenance::CacheSweeper;
pub use offline_queue::{
    DrainOutcome, DrainReport, OfflineQueue, QueueConfig, QueueProcessor, QueueStats,
    ReplayFailure, Subscription,
};
pub use rate_gate::RateGate;
pub use retry::{BackoffPolicy, RetryDecision};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
