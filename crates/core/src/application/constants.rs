// Orchestration constants (No magic values)
use std::time::Duration;

// --- Cache Store ---

/// TTL applied when a caller gives none (5 minutes)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Maximum entries held by the in-memory cache tier
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 50;

/// Interval of the background expired-entry sweep (5 minutes)
pub const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Prefix of every durable cache key
pub const CACHE_STORAGE_PREFIX: &str = "nexus_cache_";

/// Cache namespace for AI responses
pub const AI_RESPONSE_NAMESPACE: &str = "ai_response";

// --- Durable Queue ---

/// Storage key of the queue snapshot
pub const QUEUE_STORAGE_KEY: &str = "offline_queue";

/// Queue capacity; the oldest request is evicted past this
pub const MAX_QUEUE_SIZE: usize = 50;

/// Replay attempts before a queued request is parked as failed
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

// --- Error Classifier ---

/// Size of the diagnostic ring buffer
pub const ERROR_LOG_CAPACITY: usize = 50;

// --- Task Dispatcher ---

/// Backend model identifier
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

/// Minimum gap between two outbound transport calls (1s)
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(1);

/// Transport call timeout (30s)
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default local retry budget
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Retry budget used when replaying queued requests
pub const REPLAY_MAX_RETRIES: u32 = 1;

/// First backoff step (1s)
pub const BACKOFF_BASE_DELAY: Duration = Duration::from_secs(1);

/// Backoff ceiling (10s)
pub const BACKOFF_MAX_DELAY: Duration = Duration::from_secs(10);

/// TTL of cached AI responses (10 minutes)
pub const RESPONSE_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

/// Sampling temperature for all task types
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Reasoning-depth hint for diagnostic tasks
pub const DIAGNOSTIC_THINKING_BUDGET: u32 = 8000;

/// Geolocation lookup bound for map tasks (5s)
pub const GEOLOCATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Consecutive failures before escalation is suggested
pub const ESCALATION_THRESHOLD: u64 = 3;

/// Text substituted when the backend returns nothing
pub const EMPTY_RESPONSE_TEXT: &str = "No response generated.";

/// Text returned when a request is parked in the offline queue
pub const OFFLINE_QUEUED_TEXT: &str =
    "You are offline. This request has been queued and will be processed when connection is restored.";

/// Text returned when no transport is configured
pub const NOT_CONFIGURED_TEXT: &str =
    "AI service is not configured. Set an API key to enable AI assistance.";
