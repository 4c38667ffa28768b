//! HTTP plumbing shared by the OpenAI-compatible engine adapters.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode, header::HeaderValue};
use serde::Deserialize;
use volley_core::config::EngineConfig;
use volley_core::error::{Result, VolleyError};

/// Builds a client for buffered requests, bounded by the request timeout.
pub(crate) fn buffered_client(config: &EngineConfig) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|err| VolleyError::config(format!("Failed to build HTTP client: {err}")))
}

/// Builds a client for streamed requests.
///
/// No overall timeout: a healthy stream may run for minutes. Stalls are caught
/// by the per-fragment timeout instead.
pub(crate) fn streaming_client(config: &EngineConfig) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .build()
        .map_err(|err| VolleyError::config(format!("Failed to build HTTP client: {err}")))
}

/// Joins the configured base URL and an endpoint path.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

/// Maps a failure to send a request.
pub(crate) fn map_transport_error(context: &str, err: reqwest::Error) -> VolleyError {
    if err.is_connect() || err.is_timeout() || err.is_request() {
        VolleyError::engine_unavailable(format!("{context}: {err}"))
    } else {
        VolleyError::engine(format!("{context}: {err}"))
    }
}

/// Maps a failure to read a buffered response body.
///
/// reqwest reports these as decode errors; nothing has been parsed yet, so the
/// connection itself went away.
pub(crate) fn map_body_error(context: &str, err: reqwest::Error) -> VolleyError {
    VolleyError::engine_unavailable(format!("{context}: {err}"))
}

/// Returns the response unchanged on 2xx, a mapped error otherwise.
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let retry_after = parse_retry_after(response.headers().get("retry-after"));
    let body_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read engine error body".to_string());
    Err(map_http_error(status, body_text, retry_after))
}

#[derive(Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Deserialize)]
pub(crate) struct ErrorBody {
    pub message: String,
}

/// vLLM reports errors as a flat object: `{"object": "error", "message": ...}`.
#[derive(Deserialize)]
struct FlatErrorResponse {
    object: String,
    message: String,
}

/// Extracts the human-readable message from an error body, if it has one.
pub(crate) fn error_message(body: &str) -> Option<String> {
    if let Ok(wrapper) = serde_json::from_str::<ErrorResponse>(body) {
        return Some(wrapper.error.message);
    }
    serde_json::from_str::<FlatErrorResponse>(body)
        .ok()
        .filter(|flat| flat.object == "error")
        .map(|flat| flat.message)
}

pub(crate) fn map_http_error(
    status: StatusCode,
    body: String,
    retry_after: Option<Duration>,
) -> VolleyError {
    let message = error_message(&body).unwrap_or(body);

    let retryable = matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    );

    VolleyError::EngineError {
        status: Some(status.as_u16()),
        message,
        retryable,
        retry_after_ms: retry_after.map(|d| d.as_millis() as u64),
    }
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    // Retry-After HTTP-date parsing is omitted for simplicity
    None
}
