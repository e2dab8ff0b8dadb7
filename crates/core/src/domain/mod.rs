// Domain Layer - Pure business logic and entities

pub mod cache;
pub mod error;
pub mod error_report;
pub mod queue;
pub mod task;

// Re-exports
pub use cache::CacheEntry;
pub use error::DomainError;
pub use error_report::{ErrorKind, ErrorReport};
pub use queue::{QueuedPayload, QueuedRequest, RequestId, RequestKind, RequestState};
pub use task::{error_tag, AiResponse, TaskType};
