// AI Transport Port
// Abstraction over the generative-AI backend

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Capability requested from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolRequest {
    /// Location-aware retrieval
    MapsGrounding,
}

/// Structured hint for the requested tools
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    pub lat_lng: Coordinates,
}

/// Per-call generation options
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    /// Reasoning-depth hint
    pub thinking_budget: Option<u32>,
    pub tools: Vec<ToolRequest>,
    pub tool_config: Option<ToolConfig>,
}

/// Transport failures
///
/// Display strings are what the error classifier inspects.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("failed to fetch: {0}")]
    Connect(String),

    #[error("API error {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Other(String),
}

/// AI Transport trait
///
/// Implementations:
/// - GeminiTransport (infra-gemini)
/// - MockTransport (tests)
#[async_trait]
pub trait AiTransport: Send + Sync {
    /// Generate one complete answer for `prompt`
    ///
    /// # Errors
    /// - TransportError::Connect if the backend cannot be reached
    /// - TransportError::Upstream if the backend rejects the call
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<String, TransportError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Scripted outcome for one call
    #[derive(Debug, Clone)]
    pub enum MockReply {
        Text(String),
        Fail(TransportError),
        /// Sleep before answering (for timeout tests)
        Delay(Duration, String),
    }

    /// A recorded call
    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub model: String,
        pub prompt: String,
        pub config: GenerationConfig,
        pub at: Instant,
    }

    /// Transport that replays a script, then falls back to a default reply
    pub struct MockTransport {
        script: Mutex<VecDeque<MockReply>>,
        fallback: MockReply,
        calls: Mutex<Vec<RecordedCall>>,
    }
    impl MockTransport {
        pub fn new(fallback: MockReply) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback,
                calls: Mutex::new(Vec::new()),
            }
        }
        pub fn new_success(text: impl Into<String>) -> Self {
            Self::new(MockReply::Text(text.into()))
        }
        pub fn new_fail(error: TransportError) -> Self {
            Self::new(MockReply::Fail(error))
        }
        /// Queue replies consumed in order before the fallback applies
        pub fn with_script(self, replies: impl IntoIterator<Item = MockReply>) -> Self {
            self.script.lock().unwrap().extend(replies);
            self
        }
        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }
    }
    #[async_trait]
    impl AiTransport for MockTransport {
        async fn generate(
            &self,
            model: &str,
            prompt: &str,
            config: &GenerationConfig,
        ) -> Result<String, TransportError> {
            self.calls.lock().unwrap().push(RecordedCall {
                model: model.to_string(),
                prompt: prompt.to_string(),
                config: config.clone(),
                at: Instant::now(),
            });

            let reply = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());

            match reply {
                MockReply::Text(text) => Ok(text),
                MockReply::Fail(err) => Err(err),
                MockReply::Delay(delay, text) => {
                    tokio::time::sleep(delay).await;
                    Ok(text)
                }
            }
        }
    }
}
