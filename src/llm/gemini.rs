use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{Config, SCENE_ANALYSIS_PROMPT};
use crate::error::PipelineError;
use crate::llm::media::detect_mime_type;
use crate::scene::SceneAnalysis;
use crate::utils::http::get_http_client;
use crate::utils::timing::log_service_timing;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const ANALYSIS_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(message) = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .or_else(|| value.get("message").and_then(|v| v.as_str()))
        {
            return message.to_string();
        }
        return truncate_for_log(&value.to_string(), 2000);
    }

    truncate_for_log(trimmed, 2000)
}

/// The model is asked for raw JSON but routinely wraps it in a markdown
/// code fence, with or without a `json` tag.
fn strip_code_fence(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

fn extract_text(response: GeminiResponse) -> String {
    let mut parts_text = Vec::new();
    for candidate in response.candidates.unwrap_or_default() {
        if let Some(content) = candidate.content {
            for part in content.parts.unwrap_or_default() {
                if let Some(text) = part.text {
                    if !text.trim().is_empty() {
                        parts_text.push(text);
                    }
                }
            }
        }
    }
    parts_text.join("\n")
}

fn parse_analysis_text(text: &str) -> Result<SceneAnalysis, PipelineError> {
    let cleaned = strip_code_fence(text);
    let analysis: SceneAnalysis = serde_json::from_str(cleaned).map_err(|err| {
        PipelineError::AnalysisFailed(format!(
            "response is not a valid scene analysis: {err} (body: {})",
            truncate_for_log(cleaned, 300)
        ))
    })?;
    analysis.validate()
}

/// Adapter for the external vision model (C3). One attempt per call; the
/// caller decides whether re-analysis is worth another round trip.
#[derive(Debug, Clone)]
pub struct SceneAnalyzer {
    api_key: String,
    model: String,
}

impl SceneAnalyzer {
    pub fn new(config: &Config) -> Self {
        SceneAnalyzer {
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
        }
    }

    /// Submits the photograph with the fixed extraction prompt and returns
    /// the validated structured description.
    pub async fn analyze(&self, image_bytes: &[u8]) -> Result<SceneAnalysis, PipelineError> {
        log_service_timing("gemini", "analyze_scene", || async {
            self.analyze_inner(image_bytes).await
        })
        .await
    }

    async fn analyze_inner(&self, image_bytes: &[u8]) -> Result<SceneAnalysis, PipelineError> {
        if image_bytes.is_empty() {
            return Err(PipelineError::AnalysisFailed(
                "image is empty".to_string(),
            ));
        }

        let mime_type = detect_mime_type(image_bytes).unwrap_or_else(|| {
            warn!("Could not detect image MIME type; assuming image/png");
            "image/png".to_string()
        });
        let encoded = general_purpose::STANDARD.encode(image_bytes);

        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": SCENE_ANALYSIS_PROMPT },
                    { "inlineData": { "mimeType": mime_type, "data": encoded } }
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json"
            }
        });

        let url = format!("{}/{}:generateContent", GEMINI_BASE_URL, self.model);
        let client = get_http_client();
        let response = client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(ANALYSIS_REQUEST_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                PipelineError::AnalysisFailed(format!("analysis request failed: {err}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = summarize_error_body(&body);
            warn!("Scene analysis error: status={status}, detail={detail}");
            return Err(PipelineError::AnalysisFailed(format!(
                "analysis request failed with status {status}: {detail}"
            )));
        }

        let parsed = response.json::<GeminiResponse>().await.map_err(|err| {
            PipelineError::AnalysisFailed(format!("malformed analysis response: {err}"))
        })?;
        let text = extract_text(parsed);
        if text.trim().is_empty() {
            return Err(PipelineError::AnalysisFailed(
                "analysis response contained no text".to_string(),
            ));
        }

        debug!(target: "llm.gemini", model = %self.model, response = %truncate_for_log(&text, 400));
        parse_analysis_text(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_tagged_code_fence() {
        let fenced = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(fenced), "{\"a\": 1}");
    }

    #[test]
    fn strips_untagged_code_fence() {
        let fenced = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(fenced), "{\"a\": 1}");
    }

    #[test]
    fn leaves_bare_json_untouched() {
        assert_eq!(strip_code_fence(" {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn parses_fenced_analysis_payload() {
        let text = r#"```json
{
  "global_description": "A studio shot of a beverage can.",
  "scene_type": "studio",
  "subjects": [{ "type": "object", "detailed_description": "A silver can" }],
  "metadata_confidence": 0.9
}
```"#;
        let analysis = parse_analysis_text(text).unwrap();
        assert_eq!(analysis.subjects.len(), 1);
        assert_eq!(analysis.metadata_confidence, 0.9);
    }

    #[test]
    fn rejects_schema_mismatch() {
        let err = parse_analysis_text("{\"unexpected\": true}").unwrap_err();
        assert!(matches!(err, PipelineError::AnalysisFailed(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = parse_analysis_text("not json at all").unwrap_err();
        assert!(matches!(err, PipelineError::AnalysisFailed(_)));
    }

    #[test]
    fn extracts_text_across_candidate_parts() {
        let response: GeminiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": { "parts": [ { "text": "first" }, { "text": "second" } ] }
            }]
        }))
        .unwrap();
        assert_eq!(extract_text(response), "first\nsecond");
    }
}
