// AI Task Domain Model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::domain::error::DomainError;

/// Kind of AI task requested by a caller.
///
/// The task type selects the generation configuration (reasoning depth,
/// location grounding) and is part of the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Diagnostic,
    Map,
    Report,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Diagnostic => "diagnostic",
            TaskType::Map => "map",
            TaskType::Report => "report",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "diagnostic" => Ok(TaskType::Diagnostic),
            "map" => Ok(TaskType::Map),
            "report" => Ok(TaskType::Report),
            other => Err(DomainError::UnknownTaskType(other.to_string())),
        }
    }
}

/// Reserved error tags carried by [`AiResponse::error`]
pub mod error_tag {
    /// No transport client is configured
    pub const NO_API_KEY: &str = "NO_API_KEY";
    /// The request could not reach the network and was queued for replay
    pub const OFFLINE_QUEUED: &str = "OFFLINE_QUEUED";
}

/// Normalized answer returned to every caller of the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiResponse {
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl AiResponse {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            error: None,
            metadata: Map::new(),
        }
    }

    pub fn failure(text: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            error: Some(tag.into()),
            metadata: Map::new(),
        }
    }

    /// Builder-style metadata insertion
    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// True when the response marks an offline-queued request
    pub fn is_queued(&self) -> bool {
        self.error.as_deref() == Some(error_tag::OFFLINE_QUEUED)
    }

    pub fn is_cached(&self) -> bool {
        self.metadata
            .get("cached")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
