// Gemini AiTransport Implementation

use crate::request::build_request_body;
use crate::response::{parse_error, parse_response_text};
use async_trait::async_trait;
use nexus_core::port::{AiTransport, GenerationConfig, TransportError};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_KEY_HEADER: &str = "x-goog-api-key";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the Gemini REST API
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// HTTP client for `models/{model}:generateContent`
///
/// The overall per-call deadline is enforced by the dispatcher, not here.
pub struct GeminiTransport {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiTransport {
    pub fn new(config: GeminiConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_decode() {
        TransportError::InvalidResponse(err.to_string())
    } else {
        // connect, DNS, TLS and reset errors all surface as a failed fetch
        TransportError::Connect(err.to_string())
    }
}

#[async_trait]
impl AiTransport for GeminiTransport {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<String, TransportError> {
        let body = build_request_body(prompt, config);

        let response = self
            .client
            .post(self.endpoint(model))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_reqwest_error)?;

        debug!(
            model = %model,
            status = status.as_u16(),
            bytes = text.len(),
            "Gemini response received"
        );

        if !status.is_success() {
            return Err(parse_error(status.as_u16(), &text));
        }

        parse_response_text(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve exactly one HTTP exchange and hand back the raw request
    async fn one_shot_server(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];

            // Read headers, then Content-Length bytes of body
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            let reply = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });

        (base_url, handle)
    }

    #[tokio::test]
    async fn test_generate_success() {
        let (base_url, server) = one_shot_server(
            "HTTP/1.1 200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"Replace the relay."}]}}]}"#,
        )
        .await;
        let transport =
            GeminiTransport::new(GeminiConfig::new("test-key").with_base_url(base_url)).unwrap();

        let text = transport
            .generate("gemini-2.0-flash-exp", "diagnose", &GenerationConfig::default())
            .await
            .unwrap();
        assert_eq!(text, "Replace the relay.");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1beta/models/gemini-2.0-flash-exp:generateContent"));
        assert!(request.to_lowercase().contains("x-goog-api-key: test-key"));
        assert!(request.contains(r#""text":"diagnose""#));
    }

    #[tokio::test]
    async fn test_generate_upstream_error() {
        let (base_url, _server) = one_shot_server(
            "HTTP/1.1 429 Too Many Requests",
            r#"{"error":{"code":429,"message":"Resource exhausted"}}"#,
        )
        .await;
        let transport =
            GeminiTransport::new(GeminiConfig::new("k").with_base_url(base_url)).unwrap();

        let err = transport
            .generate("m", "p", &GenerationConfig::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TransportError::Upstream {
                status: 429,
                message: "Resource exhausted".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_generate_unreachable_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport =
            GeminiTransport::new(GeminiConfig::new("k").with_base_url(format!("http://{addr}")))
                .unwrap();
        let err = transport
            .generate("m", "p", &GenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)));
        assert!(err.to_string().starts_with("failed to fetch"));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let transport =
            GeminiTransport::new(GeminiConfig::new("k").with_base_url("http://host/")).unwrap();
        assert_eq!(
            transport.endpoint("gemini-2.0-flash-exp"),
            "http://host/v1beta/models/gemini-2.0-flash-exp:generateContent"
        );
    }
}
