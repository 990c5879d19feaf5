//! Failure classification shared by the HTTP providers.

use super::provider::{TransientError, is_retryable_status};
use anyhow::anyhow;
use reqwest::StatusCode;

/// Longest slice of an error body kept in messages.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Map a failed `send()` or body read. Timeouts and connection failures are transient.
pub(crate) fn request_failure(provider: &str, err: reqwest::Error) -> anyhow::Error {
    if err.is_timeout() {
        return TransientError::new(format!("{provider} request timed out")).into();
    }
    if err.is_connect() {
        return TransientError::new(format!("Could not connect to {provider}: {err}")).into();
    }
    anyhow!("{provider} request failed: {err}")
}

/// Map a non-success HTTP status. Rate limits and server errors are transient.
pub(crate) fn status_failure(provider: &str, status: StatusCode, body: &str) -> anyhow::Error {
    let message = match status.as_u16() {
        401 | 403 => format!("{provider} rejected the API key ({status})"),
        429 => format!("Rate limited by {provider} ({status})"),
        _ => format!("{provider} API error {status}: {}", truncate(body)),
    };

    if is_retryable_status(status.as_u16()) {
        TransientError::new(message).into()
    } else {
        anyhow!(message)
    }
}

fn truncate(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
