// generateContent request body

use nexus_core::port::{GenerationConfig, ToolRequest};
use serde_json::{json, Map, Value};

/// Build the JSON body for one single-turn prompt
pub(crate) fn build_request_body(prompt: &str, config: &GenerationConfig) -> Value {
    let mut generation = Map::new();
    generation.insert("temperature".to_string(), json!(config.temperature));
    if let Some(budget) = config.thinking_budget {
        generation.insert("thinkingConfig".to_string(), json!({ "thinkingBudget": budget }));
    }

    let mut body = json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        "generationConfig": generation,
    });

    if !config.tools.is_empty() {
        let tools: Vec<Value> = config
            .tools
            .iter()
            .map(|tool| match tool {
                ToolRequest::MapsGrounding => json!({ "googleMaps": {} }),
            })
            .collect();
        body["tools"] = Value::Array(tools);
    }

    if let Some(tool_config) = &config.tool_config {
        body["toolConfig"] = json!({
            "retrievalConfig": {
                "latLng": {
                    "latitude": tool_config.lat_lng.latitude,
                    "longitude": tool_config.lat_lng.longitude,
                }
            }
        });
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::port::{Coordinates, ToolConfig};

    #[test]
    fn test_plain_body() {
        let config = GenerationConfig {
            temperature: 0.5,
            ..Default::default()
        };
        let body = build_request_body("hello", &config);

        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["temperature"], 0.5);
        assert!(body["generationConfig"].get("thinkingConfig").is_none());
        assert!(body.get("tools").is_none());
        assert!(body.get("toolConfig").is_none());
    }

    #[test]
    fn test_thinking_budget() {
        let config = GenerationConfig {
            thinking_budget: Some(8000),
            ..Default::default()
        };
        let body = build_request_body("why", &config);
        assert_eq!(
            body["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            8000
        );
    }

    #[test]
    fn test_maps_grounding_with_location() {
        let config = GenerationConfig {
            tools: vec![ToolRequest::MapsGrounding],
            tool_config: Some(ToolConfig {
                lat_lng: Coordinates {
                    latitude: 1.5,
                    longitude: -2.5,
                },
            }),
            ..Default::default()
        };
        let body = build_request_body("where", &config);

        assert_eq!(body["tools"], json!([{ "googleMaps": {} }]));
        assert_eq!(
            body["toolConfig"]["retrievalConfig"]["latLng"],
            json!({ "latitude": 1.5, "longitude": -2.5 })
        );
    }
}
