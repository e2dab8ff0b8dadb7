// Error Classifier
// Maps caught failures onto the ErrorKind taxonomy and keeps a bounded diagnostic log

use crate::application::constants::ERROR_LOG_CAPACITY;
use crate::domain::{ErrorKind, ErrorReport};
use crate::port::{TimeProvider, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, warn};

const GENERIC_FAILURE_MESSAGE: &str = "An unknown error occurred";

/// Context key holding the raw failure message
pub const DETAIL_KEY: &str = "detail";

/// A failure as caught by the dispatcher
#[derive(Debug, Clone, Copy)]
pub enum CaughtFailure<'a> {
    Transport(&'a TransportError),
    Error(&'a (dyn std::error::Error + 'static)),
    /// Something failed but carried no message
    Opaque,
}

impl CaughtFailure<'_> {
    fn message(&self) -> Option<String> {
        let message = match self {
            CaughtFailure::Transport(e) => e.to_string(),
            CaughtFailure::Error(e) => e.to_string(),
            CaughtFailure::Opaque => return None,
        };
        if message.trim().is_empty() {
            None
        } else {
            Some(message)
        }
    }
}

/// Pure mapping from a failure to its kind and raw message
///
/// Only transport failures are matched against fetch/connect wording.
pub fn classify_failure(failure: CaughtFailure<'_>) -> (ErrorKind, String) {
    let transport = match failure {
        CaughtFailure::Transport(TransportError::Connect(_) | TransportError::Timeout) => {
            return (ErrorKind::Network, failure_message(&failure));
        }
        CaughtFailure::Transport(TransportError::Upstream { .. }) => {
            return (ErrorKind::Upstream, failure_message(&failure));
        }
        CaughtFailure::Transport(_) => true,
        CaughtFailure::Error(_) | CaughtFailure::Opaque => false,
    };

    let Some(message) = failure.message() else {
        return (ErrorKind::Unknown, GENERIC_FAILURE_MESSAGE.to_string());
    };

    let lowered = message.to_lowercase();
    let kind = if transport && (lowered.contains("fetch") || lowered.contains("connect")) {
        ErrorKind::Network
    } else if lowered.contains("storage") {
        ErrorKind::Storage
    } else if message.contains("API") {
        ErrorKind::Upstream
    } else {
        ErrorKind::Unknown
    };

    (kind, message)
}

fn failure_message(failure: &CaughtFailure<'_>) -> String {
    failure
        .message()
        .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string())
}

/// Number of classified errors per kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorStats {
    pub total: usize,
    pub by_kind: BTreeMap<String, usize>,
}

/// Classifier with a bounded ring buffer of recent reports
pub struct ErrorClassifier {
    time_provider: Arc<dyn TimeProvider>,
    capacity: usize,
    log: Mutex<VecDeque<ErrorReport>>,
}

impl ErrorClassifier {
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self::with_capacity(time_provider, ERROR_LOG_CAPACITY)
    }

    pub fn with_capacity(time_provider: Arc<dyn TimeProvider>, capacity: usize) -> Self {
        Self {
            time_provider,
            capacity: capacity.max(1),
            log: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Classify `failure`, record it and return the report
    ///
    /// The report message is the user-facing text for the kind, except for
    /// unknown failures which keep their own message. The raw message is
    /// always kept under `detail` in the context.
    pub fn classify(&self, failure: CaughtFailure<'_>, context: Option<Map<String, Value>>) -> ErrorReport {
        let (kind, detail) = classify_failure(failure);
        let message = match kind {
            ErrorKind::Unknown => detail.clone(),
            _ => kind.user_message().to_string(),
        };

        let mut context = context.unwrap_or_default();
        context.insert(DETAIL_KEY.to_string(), Value::from(detail));
        self.record(kind, message, Some(context))
    }

    /// Record a failure whose kind is already known (e.g. validation)
    pub fn record(
        &self,
        kind: ErrorKind,
        message: impl Into<String>,
        context: Option<Map<String, Value>>,
    ) -> ErrorReport {
        let mut report = ErrorReport::new(kind, message, self.time_provider.now_millis());
        if let Some(context) = context {
            report = report.with_context(context);
        }

        if kind.is_recoverable() {
            warn!(kind = %kind, message = %report.message, context = ?report.context, "Classified recoverable failure");
        } else {
            error!(kind = %kind, message = %report.message, context = ?report.context, "Classified failure");
        }

        let mut log = self.lock_log();
        if log.len() >= self.capacity {
            log.pop_front();
        }
        log.push_back(report.clone());

        report
    }

    pub fn is_recoverable(&self, kind: ErrorKind) -> bool {
        kind.is_recoverable()
    }

    pub fn user_message(&self, kind: ErrorKind) -> &'static str {
        kind.user_message()
    }

    /// Up to `limit` most recent reports, newest first
    pub fn recent(&self, limit: usize) -> Vec<ErrorReport> {
        self.lock_log().iter().rev().take(limit).cloned().collect()
    }

    pub fn stats(&self) -> ErrorStats {
        let log = self.lock_log();
        let mut stats = ErrorStats {
            total: log.len(),
            by_kind: BTreeMap::new(),
        };
        for report in log.iter() {
            *stats.by_kind.entry(report.kind.tag().to_string()).or_insert(0) += 1;
        }
        stats
    }

    pub fn clear_log(&self) {
        self.lock_log().clear();
    }

    fn lock_log(&self) -> MutexGuard<'_, VecDeque<ErrorReport>> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::port::time_provider::mocks::MockTimeProvider;

    fn classifier(capacity: usize) -> ErrorClassifier {
        ErrorClassifier::with_capacity(Arc::new(MockTimeProvider::new(1_000)), capacity)
    }

    #[test]
    fn test_transport_failures() {
        let connect = TransportError::Connect("dns lookup failed".into());
        assert_eq!(classify_failure(CaughtFailure::Transport(&connect)).0, ErrorKind::Network);

        assert_eq!(
            classify_failure(CaughtFailure::Transport(&TransportError::Timeout)).0,
            ErrorKind::Network
        );

        let upstream = TransportError::Upstream {
            status: 503,
            message: "overloaded".into(),
        };
        let (kind, message) = classify_failure(CaughtFailure::Transport(&upstream));
        assert_eq!(kind, ErrorKind::Upstream);
        assert_eq!(message, "API error 503: overloaded");
    }

    #[test]
    fn test_message_based_classification() {
        let storage = AppError::Storage("quota exceeded".into());
        assert_eq!(classify_failure(CaughtFailure::Error(&storage)).0, ErrorKind::Storage);

        let other = AppError::Internal("boom".into());
        let (kind, message) = classify_failure(CaughtFailure::Error(&other));
        assert_eq!(kind, ErrorKind::Unknown);
        assert_eq!(message, "Internal error: boom");

        let fetch = TransportError::Other("Failed to fetch".into());
        assert_eq!(classify_failure(CaughtFailure::Transport(&fetch)).0, ErrorKind::Network);
    }

    #[test]
    fn test_connect_wording_outside_transport_is_not_network() {
        let storage =
            AppError::Storage("Storage backend error: error connecting to database file".into());
        assert_eq!(classify_failure(CaughtFailure::Error(&storage)).0, ErrorKind::Storage);

        let internal = AppError::Internal("failed to fetch row".into());
        assert_eq!(classify_failure(CaughtFailure::Error(&internal)).0, ErrorKind::Unknown);
    }

    #[test]
    fn test_report_message_is_user_facing() {
        let classifier = classifier(10);
        let connect = TransportError::Connect("connection refused".into());

        let report = classifier.classify(CaughtFailure::Transport(&connect), None);
        assert_eq!(report.kind, ErrorKind::Network);
        assert_eq!(report.message, ErrorKind::Network.user_message());
        assert_eq!(report.detail(), "failed to fetch: connection refused");

        let other = AppError::Internal("boom".into());
        let report = classifier.classify(CaughtFailure::Error(&other), None);
        assert_eq!(report.message, "Internal error: boom");
        assert_eq!(report.detail(), "Internal error: boom");
    }

    #[test]
    fn test_missing_message_uses_generic_fallback() {
        let (kind, message) = classify_failure(CaughtFailure::Opaque);
        assert_eq!(kind, ErrorKind::Unknown);
        assert_eq!(message, GENERIC_FAILURE_MESSAGE);

        let blank = TransportError::Other("  ".into());
        assert_eq!(classify_failure(CaughtFailure::Transport(&blank)).1, GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn test_ring_buffer_is_bounded() {
        let classifier = classifier(3);
        for i in 0..5 {
            classifier.record(ErrorKind::Unknown, format!("e{i}"), None);
        }

        let recent = classifier.recent(10);
        let messages: Vec<_> = recent.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["e4", "e3", "e2"]);
        assert_eq!(classifier.recent(1).len(), 1);
    }

    #[test]
    fn test_stats_and_clear() {
        let classifier = classifier(10);
        classifier.classify(CaughtFailure::Transport(&TransportError::Timeout), None);
        classifier.classify(CaughtFailure::Transport(&TransportError::Timeout), None);
        classifier.record(ErrorKind::Validation, "empty prompt", None);

        let stats = classifier.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_kind.get("NETWORK"), Some(&2));
        assert_eq!(stats.by_kind.get("VALIDATION"), Some(&1));

        classifier.clear_log();
        assert_eq!(classifier.stats(), ErrorStats::default());
    }

    #[test]
    fn test_report_carries_timestamp_and_context() {
        let classifier = classifier(10);
        let mut context = Map::new();
        context.insert("task_type".into(), Value::from("map"));

        let report = classifier.classify(CaughtFailure::Opaque, Some(context.clone()));
        assert_eq!(report.occurred_at, 1_000);
        context.insert(DETAIL_KEY.into(), Value::from(GENERIC_FAILURE_MESSAGE));
        assert_eq!(report.context, Some(context));
        assert!(!classifier.is_recoverable(report.kind));
    }
}
