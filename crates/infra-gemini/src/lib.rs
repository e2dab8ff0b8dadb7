// Nexus Infrastructure - Gemini Adapter
// Implements: AiTransport (generateContent REST endpoint)

mod request;
mod response;
mod transport;

pub use transport::{GeminiConfig, GeminiTransport, DEFAULT_BASE_URL};
