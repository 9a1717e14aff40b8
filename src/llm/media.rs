use std::time::Duration;

use reqwest::StatusCode;
use tracing::{error, warn};

use crate::utils::http::get_http_client;

const DOWNLOAD_MAX_ATTEMPTS: usize = 3;
const DOWNLOAD_BASE_DELAY_MS: u64 = 400;
const ERROR_BODY_LOG_LIMIT: usize = 800;

/// MIME sniffing for uploaded product photos. HEIC/HEIF brands hide inside
/// the ftyp box, which `infer` does not recognize on its own.
pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn should_retry_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

fn should_retry_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

/// Fetches a finished render from the URL the generation service returned.
/// Bounded retry: the render is already paid for, losing it to a transient
/// download error would force the user to regenerate.
pub async fn download_image_bytes(url: &str) -> Option<Vec<u8>> {
    let client = get_http_client();
    for attempt in 0..DOWNLOAD_MAX_ATTEMPTS {
        let response = match client.get(url).send().await {
            Ok(resp) => resp,
            Err(err) => {
                warn!(
                    "Failed to fetch generated image {url}: {err} (timeout={}, connect={}, attempt={}/{})",
                    err.is_timeout(),
                    err.is_connect(),
                    attempt + 1,
                    DOWNLOAD_MAX_ATTEMPTS
                );
                if !should_retry_error(&err) || attempt + 1 == DOWNLOAD_MAX_ATTEMPTS {
                    return None;
                }
                tokio::time::sleep(Duration::from_millis(DOWNLOAD_BASE_DELAY_MS << attempt)).await;
                continue;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(
                "Image download failed for {url} with status {}: {}",
                status,
                truncate_for_log(&body, ERROR_BODY_LOG_LIMIT)
            );
            if !should_retry_status(status) || attempt + 1 == DOWNLOAD_MAX_ATTEMPTS {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(DOWNLOAD_BASE_DELAY_MS << attempt)).await;
            continue;
        }

        match response.bytes().await {
            Ok(bytes) => return Some(bytes.to_vec()),
            Err(err) => {
                error!(
                    "Failed to read image bytes from {url}: {err} (attempt={}/{})",
                    attempt + 1,
                    DOWNLOAD_MAX_ATTEMPTS
                );
                if attempt + 1 == DOWNLOAD_MAX_ATTEMPTS {
                    return None;
                }
                tokio::time::sleep(Duration::from_millis(DOWNLOAD_BASE_DELAY_MS << attempt)).await;
            }
        }
    }

    None
}
