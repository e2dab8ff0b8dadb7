// generateContent response parsing

use nexus_core::port::TransportError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Concatenated text parts of the first candidate; empty if there is none
pub(crate) fn parse_response_text(body: &str) -> Result<String, TransportError> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;

    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    Ok(text)
}

/// Map a non-2xx reply to an upstream error, preferring the API's own message
pub(crate) fn parse_error(status: u16, body: &str) -> TransportError {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => "empty error body".to_string(),
        Err(_) => body.trim().chars().take(200).collect(),
    };
    TransportError::Upstream { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joins_text_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Check "},{"text":"the fuse."}]}},
                       {"content":{"parts":[{"text":"ignored"}]}}]}"#;
        assert_eq!(parse_response_text(body).unwrap(), "Check the fuse.");
    }

    #[test]
    fn test_no_candidates_is_empty_text() {
        assert_eq!(parse_response_text("{}").unwrap(), "");
        assert_eq!(
            parse_response_text(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap(),
            ""
        );
    }

    #[test]
    fn test_malformed_body() {
        assert!(matches!(
            parse_response_text("<html>"),
            Err(TransportError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_error_envelope() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        let err = parse_error(400, body);
        assert_eq!(err.to_string(), "API error 400: API key not valid");
    }

    #[test]
    fn test_error_without_envelope() {
        assert_eq!(
            parse_error(503, "  "),
            TransportError::Upstream {
                status: 503,
                message: "empty error body".to_string()
            }
        );
        assert!(matches!(parse_error(502, "Bad Gateway"), TransportError::Upstream { message, .. } if message == "Bad Gateway"));
    }
}
