// Classified Failure Report

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Failure taxonomy used by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Network,
    Upstream,
    Storage,
    Validation,
    Unknown,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::Network,
        ErrorKind::Upstream,
        ErrorKind::Storage,
        ErrorKind::Validation,
        ErrorKind::Unknown,
    ];

    /// Only network and upstream failures are retried or queued offline.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::Upstream)
    }

    /// Error tag placed on failed responses
    pub fn tag(&self) -> &'static str {
        match self {
            ErrorKind::Network => "NETWORK",
            ErrorKind::Upstream => "UPSTREAM",
            ErrorKind::Storage => "STORAGE",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }

    /// Short actionable text for a technician
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::Network => {
                "Network error. Check your connection; requests will be queued while offline."
            }
            ErrorKind::Upstream => "The AI service is unavailable right now. Please try again shortly.",
            ErrorKind::Storage => "Device storage error. Free up space or restart the app.",
            ErrorKind::Validation => "Invalid input. Please check your request and try again.",
            ErrorKind::Unknown => "An unexpected error occurred. Please try again.",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A classified failure, kept only in the classifier's diagnostic ring buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub occurred_at: i64, // epoch ms

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>, occurred_at: i64) -> Self {
        Self {
            kind,
            message: message.into(),
            occurred_at,
            context: None,
        }
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind.is_recoverable()
    }

    /// Raw failure message from the context, falling back to `message`
    pub fn detail(&self) -> &str {
        self.context
            .as_ref()
            .and_then(|c| c.get("detail"))
            .and_then(Value::as_str)
            .unwrap_or(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        let recoverable: Vec<_> = ErrorKind::ALL
            .iter()
            .filter(|k| k.is_recoverable())
            .collect();
        assert_eq!(recoverable, vec![&ErrorKind::Network, &ErrorKind::Upstream]);
    }

    #[test]
    fn test_kind_serializes_as_tag() {
        for kind in ErrorKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::String(kind.tag().to_string()));
        }
    }
}
