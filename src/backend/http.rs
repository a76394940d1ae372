//! reqwest plumbing shared by the provider adapters.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::BackendError;

/// Longest provider error body kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Build a client whose own timeout matches the backend's deadline.
pub(crate) fn build_client(
    backend: &str,
    timeout: Duration,
) -> Result<reqwest::Client, BackendError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| {
            BackendError::configuration(backend, format!("failed to build HTTP client: {}", e))
        })
}

/// POST a JSON body and decode a JSON reply, mapping every failure to a `BackendError`.
pub(crate) async fn post_json<B, R>(
    backend: &str,
    timeout: Duration,
    request: reqwest::RequestBuilder,
    body: &B,
) -> Result<R, BackendError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = request
        .header("content-type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| map_send_error(backend, timeout, e))?;

    let status = response.status();
    if !status.is_success() {
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(BackendError::Provider {
            backend: backend.to_string(),
            status: status.as_u16(),
            message: provider_error_message(&text),
        });
    }

    response
        .json::<R>()
        .await
        .map_err(|e| BackendError::transport(backend, format!("failed to decode reply: {}", e)))
}

fn map_send_error(backend: &str, timeout: Duration, err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout {
            backend: backend.to_string(),
            after: timeout,
        }
    } else {
        BackendError::transport(backend, err.to_string())
    }
}

/// Pull `error.message` out of a provider error body, or fall back to the raw text.
pub(crate) fn provider_error_message(body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.trim().to_string());

    if message.chars().count() > MAX_ERROR_BODY_CHARS {
        let truncated: String = message.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{}...", truncated)
    } else {
        message
    }
}

/// Fail with `EmptyResponse` when a provider returned only whitespace.
pub(crate) fn non_empty(backend: &str, text: String) -> Result<String, BackendError> {
    if text.trim().is_empty() {
        Err(BackendError::EmptyResponse {
            backend: backend.to_string(),
        })
    } else {
        Ok(text.trim().to_string())
    }
}
