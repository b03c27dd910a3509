//! Request plumbing shared by the HTTP providers: client construction and
//! mapping of transport failures and status codes onto [`ProviderError`].

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::{Error, ProviderError, Result};

/// Longest slice of a response body kept in error messages
const MAX_ERROR_BODY_CHARS: usize = 300;

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))
}

pub(crate) fn ensure_prompt(prompt: &str) -> std::result::Result<(), ProviderError> {
    if prompt.trim().is_empty() {
        return Err(ProviderError::InvalidRequest {
            status: 0,
            message: "prompt is empty".to_string(),
        });
    }
    Ok(())
}

/// Classify a failure that happened before a status code was received
pub(crate) fn map_send_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Network(err.to_string())
    }
}

pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    let secs: f64 = value.parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

fn truncate_chars(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => &input[..idx],
        None => input,
    }
}

/// Pull a readable message out of an error body, falling back to the raw text
pub(crate) fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let message = value
            .pointer("/error/message")
            .or_else(|| value.get("message"))
            .or_else(|| value.get("error"))
            .and_then(|m| m.as_str());
        if let Some(message) = message {
            return message.to_string();
        }
    }
    truncate_chars(body.trim(), MAX_ERROR_BODY_CHARS).to_string()
}

/// Invalid-key markers some providers send with a 400 instead of a 401
const INVALID_KEY_MARKERS: &[&str] = &[
    "api_key_invalid",
    "api key not valid",
    "invalid api key",
    "invalid_api_key",
    "incorrect api key",
    "invalid x-api-key",
];

fn looks_like_auth_failure(body: &str) -> bool {
    let lower = body.to_lowercase();
    INVALID_KEY_MARKERS.iter().any(|marker| lower.contains(marker))
}

pub(crate) fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> ProviderError {
    let message = error_message(body);
    match status.as_u16() {
        401 | 403 => ProviderError::Auth(message),
        429 => ProviderError::RateLimited { message, retry_after },
        408 => ProviderError::Timeout,
        400 if looks_like_auth_failure(body) => ProviderError::Auth(message),
        code if status.is_server_error() => ProviderError::ProviderFault { status: code, message },
        code => ProviderError::InvalidRequest { status: code, message },
    }
}

/// Check the status and decode a successful JSON body
pub(crate) async fn decode_json<T: DeserializeOwned>(
    response: Response,
    provider: &str,
) -> std::result::Result<T, ProviderError> {
    let status = response.status();
    let retry_after = parse_retry_after(response.headers());
    let body = response.text().await.map_err(map_send_error)?;

    if !status.is_success() {
        let err = classify_status(status, retry_after, &body);
        tracing::debug!(provider, status = status.as_u16(), error = %err, "Provider returned error status");
        return Err(err);
    }

    serde_json::from_str(&body).map_err(|e| {
        ProviderError::MalformedResponse(format!("failed to parse {} response: {}", provider, e))
    })
}

/// Turn an optional extracted completion into text, rejecting empty replies
pub(crate) fn require_text(text: Option<String>, provider: &str) -> std::result::Result<String, ProviderError> {
    match text {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        _ => Err(ProviderError::MalformedResponse(format!("{} response contained no text", provider))),
    }
}
