use std::time::Instant;

use chrono::Utc;
use tracing::info;

use crate::error::PipelineError;

/// Wraps an external service call with request/response timing events on the
/// `pipeline.timing` target, which the logging setup routes to its own sink.
pub async fn log_service_timing<T, F, Fut>(
    provider: &str,
    operation: &str,
    call: F,
) -> Result<T, PipelineError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, PipelineError>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    info!(
        target: "pipeline.timing",
        "event=service_request provider={} operation={} started_at={}",
        provider,
        operation,
        started_at.to_rfc3339()
    );

    let result = call().await;
    let status = if result.is_ok() { "success" } else { "error" };

    let completed_at = Utc::now();
    let duration = started_perf.elapsed().as_secs_f64();
    info!(
        target: "pipeline.timing",
        "event=service_response provider={} operation={} completed_at={} duration_s={:.3} status={}",
        provider,
        operation,
        completed_at.to_rfc3339(),
        duration,
        status
    );

    result
}
