// Task Dispatcher
// Rate limiting, response caching, retry with backoff and offline queueing
// around every call to the AI transport

use crate::application::cache::ResponseCache;
use crate::application::classifier::{CaughtFailure, ErrorClassifier, DETAIL_KEY};
use crate::application::constants::{
    AI_RESPONSE_NAMESPACE, BACKOFF_BASE_DELAY, BACKOFF_MAX_DELAY, DEFAULT_MAX_RETRIES,
    DEFAULT_MODEL, DEFAULT_TEMPERATURE, DIAGNOSTIC_THINKING_BUDGET, EMPTY_RESPONSE_TEXT,
    ESCALATION_THRESHOLD, GEOLOCATION_TIMEOUT, MIN_REQUEST_INTERVAL, NOT_CONFIGURED_TEXT,
    OFFLINE_QUEUED_TEXT, REPLAY_MAX_RETRIES, REQUEST_TIMEOUT, RESPONSE_CACHE_TTL,
};
use crate::application::offline_queue::{
    DrainOutcome, DrainReport, OfflineQueue, QueueProcessor, ReplayFailure,
};
use crate::application::rate_gate::RateGate;
use crate::application::retry::{BackoffPolicy, RetryDecision};
use crate::domain::{
    error_tag, AiResponse, ErrorKind, ErrorReport, QueuedPayload, QueuedRequest, RequestKind,
    TaskType,
};
use crate::port::{
    AiTransport, ConnectivityWatch, GenerationConfig, LocationProvider, TimeProvider, ToolConfig,
    ToolRequest, TransportError,
};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Dispatcher tunables
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub model: String,
    pub min_request_interval: Duration,
    pub request_timeout: Duration,
    pub response_cache_ttl: Duration,
    pub temperature: f32,
    pub diagnostic_thinking_budget: u32,
    pub geolocation_timeout: Duration,
    pub replay_max_retries: u32,
    pub escalation_threshold: u64,
    pub backoff_base_delay: Duration,
    pub backoff_max_delay: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            min_request_interval: MIN_REQUEST_INTERVAL,
            request_timeout: REQUEST_TIMEOUT,
            response_cache_ttl: RESPONSE_CACHE_TTL,
            temperature: DEFAULT_TEMPERATURE,
            diagnostic_thinking_budget: DIAGNOSTIC_THINKING_BUDGET,
            geolocation_timeout: GEOLOCATION_TIMEOUT,
            replay_max_retries: REPLAY_MAX_RETRIES,
            escalation_threshold: ESCALATION_THRESHOLD,
            backoff_base_delay: BACKOFF_BASE_DELAY,
            backoff_max_delay: BACKOFF_MAX_DELAY,
        }
    }
}

/// One call to [`TaskDispatcher::execute_task`]
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRequest {
    pub prompt: String,
    pub task_type: TaskType,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub use_cache: bool,
    pub context: Option<Value>,
    /// Park recoverable failures in the offline queue while offline
    pub queue_when_offline: bool,
}

impl TaskRequest {
    pub fn new(prompt: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            prompt: prompt.into(),
            task_type,
            max_retries: DEFAULT_MAX_RETRIES,
            use_cache: true,
            context: None,
            queue_when_offline: true,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    fn replay_of(request: &QueuedRequest, max_retries: u32) -> Self {
        Self {
            prompt: request.payload.prompt.clone(),
            task_type: request.payload.task_type,
            max_retries,
            use_cache: false,
            context: request.payload.context.clone(),
            queue_when_offline: false,
        }
    }
}

/// Why an offline-queue replay did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Offline,
    NotConfigured,
    AlreadyRunning,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Offline => "offline",
            SkipReason::NotConfigured => "not_configured",
            SkipReason::AlreadyRunning => "already_running",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    Skipped(SkipReason),
    Completed(DrainReport),
}

/// Counts caller-visible failures for escalation to a human
///
/// A response counts when it carries an error tag other than
/// `OFFLINE_QUEUED`, otherwise when its text mentions "unable" or
/// "contact supervisor" (case-insensitive).
pub struct EscalationTracker {
    failures: AtomicU64,
    threshold: u64,
}

impl EscalationTracker {
    pub fn new(threshold: u64) -> Self {
        Self {
            failures: AtomicU64::new(0),
            threshold,
        }
    }

    /// Returns true if `response` was counted
    pub fn observe(&self, response: &AiResponse) -> bool {
        let counts = match response.error.as_deref() {
            Some(tag) if tag != error_tag::OFFLINE_QUEUED => true,
            _ => {
                let text = response.text.to_lowercase();
                text.contains("unable") || text.contains("contact supervisor")
            }
        };
        if counts {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
        counts
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.failures.store(0, Ordering::SeqCst);
    }

    pub fn needs_escalation(&self) -> bool {
        self.failure_count() >= self.threshold
    }
}

/// AI task orchestrator
///
/// One instance per process, shared through `Arc`. All mutable state (rate
/// gate, cache, queue, counters) is internally synchronized.
pub struct TaskDispatcher {
    transport: Option<Arc<dyn AiTransport>>,
    cache: Arc<ResponseCache>,
    queue: Arc<OfflineQueue>,
    classifier: Arc<ErrorClassifier>,
    connectivity: ConnectivityWatch,
    location: Option<Arc<dyn LocationProvider>>,
    time_provider: Arc<dyn TimeProvider>,
    rate_gate: RateGate,
    backoff: BackoffPolicy,
    escalation: EscalationTracker,
    config: DispatcherConfig,
}

impl TaskDispatcher {
    /// Create a dispatcher
    ///
    /// # Arguments
    /// * `transport` - AI backend client, None when no API key is configured
    /// * `cache` - Response cache
    /// * `queue` - Offline queue
    /// * `classifier` - Error classifier
    /// * `connectivity` - Online/offline signal
    /// * `time_provider` - Wall clock for response metadata
    /// * `config` - Tunables
    pub fn new(
        transport: Option<Arc<dyn AiTransport>>,
        cache: Arc<ResponseCache>,
        queue: Arc<OfflineQueue>,
        classifier: Arc<ErrorClassifier>,
        connectivity: ConnectivityWatch,
        time_provider: Arc<dyn TimeProvider>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            transport,
            cache,
            queue,
            classifier,
            connectivity,
            location: None,
            time_provider,
            rate_gate: RateGate::new(config.min_request_interval),
            backoff: BackoffPolicy::new(config.backoff_base_delay, config.backoff_max_delay),
            escalation: EscalationTracker::new(config.escalation_threshold),
            config,
        }
    }

    /// Geolocation source for map tasks
    pub fn with_location(mut self, location: Arc<dyn LocationProvider>) -> Self {
        self.location = Some(location);
        self
    }

    /// Shorthand for a default request
    pub async fn execute(&self, prompt: &str, task_type: TaskType) -> AiResponse {
        self.execute_task(TaskRequest::new(prompt, task_type)).await
    }

    /// Run one task to a normalized response
    ///
    /// Never fails: every path yields a success, a queued response or a
    /// failure response carrying the classified error tag.
    pub async fn execute_task(&self, request: TaskRequest) -> AiResponse {
        let response = self.run_task(&request).await;

        if self.escalation.observe(&response) {
            warn!(
                failure_count = self.escalation.failure_count(),
                needs_escalation = self.escalation.needs_escalation(),
                task_type = %request.task_type,
                "AI task counted as failure"
            );
        }

        response
    }

    /// Replay the offline queue if online and configured
    pub async fn process_offline_queue(&self) -> ReplayOutcome {
        if self.transport.is_none() {
            return ReplayOutcome::Skipped(SkipReason::NotConfigured);
        }
        if !self.connectivity.is_online() {
            debug!("Offline, queue replay postponed");
            return ReplayOutcome::Skipped(SkipReason::Offline);
        }

        let processor = ReplayProcessor { dispatcher: self };
        match self.queue.drain(&processor).await {
            DrainOutcome::AlreadyRunning => ReplayOutcome::Skipped(SkipReason::AlreadyRunning),
            DrainOutcome::Completed(report) => ReplayOutcome::Completed(report),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }

    pub fn classifier(&self) -> &Arc<ErrorClassifier> {
        &self.classifier
    }

    pub fn failure_count(&self) -> u64 {
        self.escalation.failure_count()
    }

    pub fn reset_failure_count(&self) {
        self.escalation.reset();
    }

    pub fn needs_escalation(&self) -> bool {
        self.escalation.needs_escalation()
    }

    /// The dispatch state machine shared by callers and queue replay
    async fn run_task(&self, request: &TaskRequest) -> AiResponse {
        let Some(transport) = &self.transport else {
            self.classifier
                .record(ErrorKind::Unknown, "AI transport not configured", None);
            return AiResponse::failure(NOT_CONFIGURED_TEXT, error_tag::NO_API_KEY);
        };

        if request.prompt.trim().is_empty() {
            let report = self.classifier.record(
                ErrorKind::Validation,
                "Prompt must not be empty",
                Some(failure_context(request, None)),
            );
            return AiResponse::failure(report.kind.user_message(), report.kind.tag())
                .with_meta("detail", report.detail());
        }

        let cache_key = ResponseCache::derive_key(
            AI_RESPONSE_NAMESPACE,
            &json!({ "prompt": request.prompt, "type": request.task_type }),
        );

        if request.use_cache {
            if let Some(cached) = self.cache.get::<AiResponse>(&cache_key).await {
                debug!(task_type = %request.task_type, "Returning cached AI response");
                return cached.with_meta("cached", true);
            }
        }

        let mut attempt: u32 = 0;
        loop {
            self.rate_gate.acquire().await;
            let config = self.generation_config(request.task_type).await;

            let result = tokio::time::timeout(
                self.config.request_timeout,
                transport.generate(&self.config.model, &request.prompt, &config),
            )
            .await
            .unwrap_or(Err(TransportError::Timeout));

            let error = match result {
                Ok(text) => {
                    let response = self.success_response(text, request.task_type, attempt);
                    if request.use_cache {
                        self.cache
                            .set(&cache_key, &response, Some(self.config.response_cache_ttl))
                            .await;
                    }
                    info!(task_type = %request.task_type, attempt = attempt + 1, "AI task succeeded");
                    return response;
                }
                Err(error) => error,
            };

            let report = self.classifier.classify(
                CaughtFailure::Transport(&error),
                Some(failure_context(request, Some(attempt))),
            );

            if !report.is_recoverable() {
                return failure_response(attempt + 1, &report);
            }

            if request.queue_when_offline && !self.connectivity.is_online() {
                return self.queue_offline(request).await;
            }

            match self.backoff.decide(attempt, request.max_retries) {
                RetryDecision::Retry(delay) => tokio::time::sleep(delay).await,
                RetryDecision::Exhausted => return failure_response(attempt + 1, &report),
            }
            attempt += 1;
        }
    }

    async fn generation_config(&self, task_type: TaskType) -> GenerationConfig {
        let mut config = GenerationConfig {
            temperature: self.config.temperature,
            ..GenerationConfig::default()
        };

        match task_type {
            TaskType::Diagnostic => {
                config.thinking_budget = Some(self.config.diagnostic_thinking_budget);
            }
            TaskType::Map => {
                config.tools.push(ToolRequest::MapsGrounding);
                config.tool_config = self
                    .current_location()
                    .await
                    .map(|lat_lng| ToolConfig { lat_lng });
            }
            TaskType::Report => {}
        }

        config
    }

    /// Best-effort position; any failure just omits the hint
    async fn current_location(&self) -> Option<crate::port::Coordinates> {
        let provider = self.location.as_ref()?;
        match tokio::time::timeout(self.config.geolocation_timeout, provider.current_location()).await
        {
            Ok(Ok(coords)) => Some(coords),
            Ok(Err(e)) => {
                warn!(error = %e, "Geolocation failed, continuing without location");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.geolocation_timeout.as_millis() as u64,
                    "Geolocation timed out, continuing without location"
                );
                None
            }
        }
    }

    fn success_response(&self, text: String, task_type: TaskType, attempt: u32) -> AiResponse {
        let text = if text.trim().is_empty() {
            EMPTY_RESPONSE_TEXT.to_string()
        } else {
            text
        };

        AiResponse::success(text)
            .with_meta("model", self.config.model.clone())
            .with_meta("type", task_type.as_str())
            .with_meta("attempt", attempt + 1)
            .with_meta("timestamp", self.time_provider.now_millis())
    }

    async fn queue_offline(&self, request: &TaskRequest) -> AiResponse {
        let payload = QueuedPayload {
            prompt: request.prompt.clone(),
            task_type: request.task_type,
            context: request.context.clone(),
        };

        match self.queue.enqueue(RequestKind::AiTask, payload, None).await {
            Ok(id) => {
                info!(request_id = %id, task_type = %request.task_type, "Offline, request queued");
                AiResponse::failure(OFFLINE_QUEUED_TEXT, error_tag::OFFLINE_QUEUED)
                    .with_meta("queueId", id)
                    .with_meta("queued", true)
            }
            Err(e) => {
                let mut context = failure_context(request, None);
                context.insert(DETAIL_KEY.to_string(), Value::from(e.to_string()));
                let report = self.classifier.record(
                    ErrorKind::Storage,
                    ErrorKind::Storage.user_message(),
                    Some(context),
                );
                AiResponse::failure(
                    format!(
                        "You are offline and the request could not be queued. {}",
                        report.message
                    ),
                    report.kind.tag(),
                )
                .with_meta("detail", report.detail())
            }
        }
    }
}

fn failure_context(request: &TaskRequest, attempt: Option<u32>) -> Map<String, Value> {
    let mut context = Map::new();
    context.insert("type".to_string(), Value::from(request.task_type.as_str()));
    if let Some(attempt) = attempt {
        context.insert("attempt".to_string(), Value::from(attempt + 1));
    }
    context
}

fn failure_response(attempts: u32, report: &ErrorReport) -> AiResponse {
    AiResponse::failure(
        format!("AI request failed after {} attempts. {}", attempts, report.message),
        report.kind.tag(),
    )
    .with_meta("detail", report.detail())
    .with_meta("attempts", attempts)
}

/// Replays queued requests through the dispatcher without re-queueing them
struct ReplayProcessor<'a> {
    dispatcher: &'a TaskDispatcher,
}

#[async_trait]
impl QueueProcessor for ReplayProcessor<'_> {
    async fn process(&self, request: &QueuedRequest) -> Result<(), ReplayFailure> {
        let task = TaskRequest::replay_of(request, self.dispatcher.config.replay_max_retries);
        let response = self.dispatcher.run_task(&task).await;

        match response.error {
            None => Ok(()),
            Some(tag) => {
                let detail = response
                    .metadata
                    .get("detail")
                    .and_then(Value::as_str)
                    .map(|d| format!("{tag}: {d}"));
                Err(ReplayFailure(detail.unwrap_or(tag)))
            }
        }
    }
}
