// Offline Queue Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};
use crate::domain::task::TaskType;

/// Queued request ID (`{epoch_ms}_{random suffix}`)
pub type RequestId = String;

/// Kind of deferred work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    AiTask,
}

/// Lifecycle of a queued request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Pending,
    InFlight,
    Failed,
    Done,
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestState::Pending => write!(f, "PENDING"),
            RequestState::InFlight => write!(f, "IN_FLIGHT"),
            RequestState::Failed => write!(f, "FAILED"),
            RequestState::Done => write!(f, "DONE"),
        }
    }
}

/// What gets replayed once connectivity returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedPayload {
    pub prompt: String,
    pub task_type: TaskType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl QueuedPayload {
    pub fn new(prompt: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            prompt: prompt.into(),
            task_type,
            context: None,
        }
    }
}

/// A request persisted while the device was offline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub id: RequestId,
    pub kind: RequestKind,
    pub payload: QueuedPayload,
    pub enqueued_at: i64, // epoch ms
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub state: RequestState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl QueuedRequest {
    /// Create a new pending request
    ///
    /// # Arguments
    ///
    /// * `id` - Unique request ID (injected, not generated)
    /// * `enqueued_at` - Enqueue timestamp in epoch ms (injected, not system time)
    /// * `kind` - Request kind
    /// * `payload` - What to replay
    /// * `max_attempts` - Replay attempts before the request is parked as failed
    pub fn new(
        id: impl Into<String>,
        enqueued_at: i64,
        kind: RequestKind,
        payload: QueuedPayload,
        max_attempts: u32,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            payload,
            enqueued_at,
            attempt_count: 0,
            max_attempts,
            state: RequestState::Pending,
            last_error: None,
        }
    }

    /// Eligible for the next drain pass
    pub fn is_replayable(&self) -> bool {
        self.state == RequestState::Pending && self.attempt_count < self.max_attempts
    }

    /// Pending -> InFlight
    pub fn begin_attempt(&mut self) -> Result<()> {
        if self.state != RequestState::Pending {
            return Err(self.invalid_transition(RequestState::InFlight));
        }
        self.state = RequestState::InFlight;
        Ok(())
    }

    /// InFlight -> Done
    pub fn complete(&mut self) -> Result<()> {
        if self.state != RequestState::InFlight {
            return Err(self.invalid_transition(RequestState::Done));
        }
        self.state = RequestState::Done;
        self.last_error = None;
        Ok(())
    }

    /// InFlight -> Pending | Failed, counting the attempt
    ///
    /// Only the replay path calls this, so an attempt is never double counted.
    pub fn record_failure(&mut self, error: impl Into<String>) -> Result<RequestState> {
        if self.state != RequestState::InFlight {
            return Err(self.invalid_transition(RequestState::Failed));
        }
        self.attempt_count += 1;
        self.last_error = Some(error.into());
        self.state = if self.attempt_count >= self.max_attempts {
            RequestState::Failed
        } else {
            RequestState::Pending
        };
        Ok(self.state)
    }

    /// Failed -> Pending with a fresh attempt budget
    pub fn reset_for_retry(&mut self) -> Result<()> {
        if self.state != RequestState::Failed {
            return Err(self.invalid_transition(RequestState::Pending));
        }
        self.state = RequestState::Pending;
        self.attempt_count = 0;
        self.last_error = None;
        Ok(())
    }

    /// InFlight left behind by a crash -> Pending
    ///
    /// Returns true if the request was stranded.
    pub fn recover(&mut self) -> bool {
        if self.state == RequestState::InFlight {
            self.state = RequestState::Pending;
            true
        } else {
            false
        }
    }

    fn invalid_transition(&self, to: RequestState) -> DomainError {
        DomainError::InvalidStateTransition {
            from: self.state.to_string(),
            to: to.to_string(),
        }
    }
}
