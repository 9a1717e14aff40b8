use std::future::Future;
use std::time::{Duration, Instant};

use image::DynamicImage;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::composer::GenerationRequest;
use crate::config::Config;
use crate::error::PipelineError;
use crate::llm::media::download_image_bytes;
use crate::utils::http::get_http_client;
use crate::utils::timing::log_service_timing;

const GENERATE_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Final disposition of a generation request, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    Completed,
    Error,
    Timeout,
}

/// A finished render: the decoded image plus the diagnostic record.
pub struct GenerationResult {
    pub image: DynamicImage,
    pub request_id: Option<String>,
    pub status: CompletionStatus,
    pub latency: Duration,
}

impl std::fmt::Debug for GenerationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationResult")
            .field("image", &format!("{}x{}", self.image.width(), self.image.height()))
            .field("request_id", &self.request_id)
            .field("status", &self.status)
            .field("latency", &self.latency)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Clone, Deserialize)]
struct ServiceError {
    #[serde(default)]
    message: Option<String>,
}

/// One step of the polling state machine: submitted -> polling ->
/// {completed, errored, timed_out}. Anything that is neither COMPLETED nor
/// ERROR counts as still in progress.
#[derive(Debug)]
enum PollStep {
    Completed(Option<Value>),
    InProgress,
    Errored(String),
}

fn assess_status(response: StatusResponse) -> PollStep {
    match response.status.as_deref() {
        Some("COMPLETED") => PollStep::Completed(response.result),
        Some("ERROR") => PollStep::Errored(
            response
                .error
                .and_then(|err| err.message)
                .unwrap_or_else(|| "Unknown error".to_string()),
        ),
        _ => PollStep::InProgress,
    }
}

/// Constant-interval polling; no backoff, so the total latency budget stays
/// predictable at `max_attempts * interval` plus the per-request timeouts.
async fn poll_until_complete<F, Fut>(
    mut fetch_status: F,
    interval: Duration,
    max_attempts: usize,
) -> Result<Option<Value>, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<StatusResponse, PipelineError>>,
{
    for attempt in 1..=max_attempts {
        tokio::time::sleep(interval).await;
        let response = fetch_status().await?;
        match assess_status(response) {
            PollStep::Completed(result) => {
                debug!("Generation completed after {attempt} poll(s)");
                return Ok(result);
            }
            PollStep::Errored(message) => {
                return Err(PipelineError::GenerationFailed(message));
            }
            PollStep::InProgress => {}
        }
    }
    Err(PipelineError::GenerationTimeout {
        attempts: max_attempts,
    })
}

/// Status endpoint derived from the generate endpoint: the last two path
/// segments (`image/generate`) are replaced by `status/<request_id>`.
fn status_url(endpoint: &Url, request_id: &str) -> Result<Url, PipelineError> {
    let mut url = endpoint.clone();
    {
        let mut segments = url.path_segments_mut().map_err(|_| {
            PipelineError::GenerationFailed(format!(
                "endpoint '{endpoint}' cannot carry a status path"
            ))
        })?;
        segments.pop_if_empty().pop().pop();
        segments.push("status").push(request_id);
    }
    Ok(url)
}

/// The `result` field is either an object with `image_url` or a non-empty
/// list whose first element has one.
fn extract_image_url(result: &Value) -> Option<String> {
    match result {
        Value::Object(map) => map
            .get("image_url")
            .and_then(|value| value.as_str())
            .map(|value| value.to_string()),
        Value::Array(items) => items
            .first()
            .and_then(|item| item.get("image_url"))
            .and_then(|value| value.as_str())
            .map(|value| value.to_string()),
        _ => None,
    }
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

/// Client for the external image-generation service (C6). Handles both the
/// synchronous completion path and the polled-asynchronous one.
#[derive(Debug, Clone)]
pub struct BriaClient {
    api_key: String,
    endpoint: Url,
    poll_interval: Duration,
    max_poll_attempts: usize,
}

impl BriaClient {
    pub fn new(config: &Config) -> Result<Self, PipelineError> {
        let endpoint = Url::parse(&config.bria_endpoint).map_err(|err| {
            PipelineError::GenerationFailed(format!(
                "invalid generation endpoint '{}': {err}",
                config.bria_endpoint
            ))
        })?;
        Ok(BriaClient {
            api_key: config.bria_api_key.clone(),
            endpoint,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            max_poll_attempts: config.max_poll_attempts,
        })
    }

    /// Dispatches a composed request and returns the decoded render.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, PipelineError> {
        log_service_timing("bria", "generate_image", || async {
            self.generate_inner(request).await
        })
        .await
    }

    async fn generate_inner(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, PipelineError> {
        let started = Instant::now();
        let client = get_http_client();

        debug!(
            target: "llm.bria",
            prompt = %truncate_for_log(&request.prompt, 400),
            structure_guidance_scale = request.structure_guidance_scale,
            guidance_scale = ?request.guidance_scale,
            "submitting generation request"
        );

        let response = client
            .post(self.endpoint.clone())
            .header("api_token", &self.api_key)
            .timeout(GENERATE_REQUEST_TIMEOUT)
            .json(request)
            .send()
            .await
            .map_err(|err| {
                PipelineError::GenerationFailed(format!("generation request failed: {err}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = summarize_error_body(&body);
            warn!("Generation service error: status={status}, detail={detail}");
            return Err(PipelineError::GenerationFailed(format!(
                "generation request failed with status {status}: {detail}"
            )));
        }

        let initial = response.json::<StatusResponse>().await.map_err(|err| {
            PipelineError::GenerationFailed(format!("malformed generation response: {err}"))
        })?;
        let request_id = initial.request_id.clone();

        let result = match assess_status(initial) {
            PollStep::Completed(result) => result,
            PollStep::Errored(message) => {
                return Err(PipelineError::GenerationFailed(message));
            }
            PollStep::InProgress => {
                let id = request_id.clone().ok_or_else(|| {
                    PipelineError::GenerationFailed(
                        "in-progress response carried no request_id".to_string(),
                    )
                })?;
                info!("Generation in progress, polling request {id}");
                let status_endpoint = status_url(&self.endpoint, &id)?;
                poll_until_complete(
                    || self.fetch_status(status_endpoint.clone()),
                    self.poll_interval,
                    self.max_poll_attempts,
                )
                .await?
            }
        };

        let result = result.ok_or_else(|| {
            PipelineError::GenerationFailed(
                "unexpected response format: no 'result' field".to_string(),
            )
        })?;
        let image_url = extract_image_url(&result).ok_or_else(|| {
            PipelineError::GenerationFailed(
                "could not find image URL in response".to_string(),
            )
        })?;

        let bytes = download_image_bytes(&image_url).await.ok_or_else(|| {
            PipelineError::GenerationFailed(format!(
                "failed to download generated image from {image_url}"
            ))
        })?;
        let image = image::load_from_memory(&bytes).map_err(|err| {
            PipelineError::GenerationFailed(format!("failed to decode generated image: {err}"))
        })?;

        Ok(GenerationResult {
            image,
            request_id,
            status: CompletionStatus::Completed,
            latency: started.elapsed(),
        })
    }

    async fn fetch_status(&self, status_endpoint: Url) -> Result<StatusResponse, PipelineError> {
        let client = get_http_client();
        let response = client
            .get(status_endpoint)
            .header("api_token", &self.api_key)
            .send()
            .await
            .map_err(|err| {
                PipelineError::GenerationFailed(format!("status poll failed: {err}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::GenerationFailed(format!(
                "status poll failed with status {status}: {}",
                summarize_error_body(&body)
            )));
        }

        response.json::<StatusResponse>().await.map_err(|err| {
            PipelineError::GenerationFailed(format!("malformed status response: {err}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn status(raw: serde_json::Value) -> StatusResponse {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn status_url_replaces_last_two_segments() {
        let endpoint =
            Url::parse("https://engine.prod.bria-api.com/v2/image/generate").unwrap();
        let derived = status_url(&endpoint, "req-123").unwrap();
        assert_eq!(
            derived.as_str(),
            "https://engine.prod.bria-api.com/v2/status/req-123"
        );
    }

    #[test]
    fn extracts_image_url_from_object_result() {
        let result = serde_json::json!({ "image_url": "https://cdn.example/img.png" });
        assert_eq!(
            extract_image_url(&result).as_deref(),
            Some("https://cdn.example/img.png")
        );
    }

    #[test]
    fn extracts_image_url_from_list_result() {
        let result = serde_json::json!([
            { "image_url": "https://cdn.example/first.png" },
            { "image_url": "https://cdn.example/second.png" }
        ]);
        assert_eq!(
            extract_image_url(&result).as_deref(),
            Some("https://cdn.example/first.png")
        );
    }

    #[test]
    fn missing_image_url_yields_none() {
        assert_eq!(extract_image_url(&serde_json::json!([])), None);
        assert_eq!(extract_image_url(&serde_json::json!({"other": 1})), None);
    }

    #[tokio::test]
    async fn polling_returns_result_once_completed() {
        let responses = RefCell::new(vec![
            status(serde_json::json!({ "status": "IN_PROGRESS" })),
            status(serde_json::json!({
                "status": "COMPLETED",
                "result": { "image_url": "https://cdn.example/done.png" }
            })),
        ]);
        let result = poll_until_complete(
            || {
                let next = responses.borrow_mut().remove(0);
                async move { Ok(next) }
            },
            Duration::ZERO,
            30,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(
            extract_image_url(&result).as_deref(),
            Some("https://cdn.example/done.png")
        );
    }

    #[tokio::test]
    async fn polling_budget_exhaustion_is_a_timeout() {
        let err = poll_until_complete(
            || async { Ok(status(serde_json::json!({ "status": "IN_PROGRESS" }))) },
            Duration::ZERO,
            30,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::GenerationTimeout { attempts: 30 }
        ));
    }

    #[tokio::test]
    async fn polling_surfaces_service_error_immediately() {
        let responses = RefCell::new(vec![
            status(serde_json::json!({ "status": "IN_PROGRESS" })),
            status(serde_json::json!({
                "status": "ERROR",
                "error": { "message": "content policy rejection" }
            })),
        ]);
        let err = poll_until_complete(
            || {
                let next = responses.borrow_mut().remove(0);
                async move { Ok(next) }
            },
            Duration::ZERO,
            30,
        )
        .await
        .unwrap_err();
        match err {
            PipelineError::GenerationFailed(message) => {
                assert_eq!(message, "content policy rejection")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn error_status_without_message_gets_placeholder() {
        match assess_status(status(serde_json::json!({ "status": "ERROR" }))) {
            PollStep::Errored(message) => assert_eq!(message, "Unknown error"),
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn error_body_summary_prefers_nested_message() {
        let body = r#"{"error": {"message": "quota exceeded"}}"#;
        assert_eq!(summarize_error_body(body), "quota exceeded");
    }
}
