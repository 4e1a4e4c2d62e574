//! Shared HTTP helpers for authenticated calls.

use crate::error::{Error, NetworkFailure, Result};
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;

/// Longest server message kept in a rejection.
const MAX_MESSAGE_LEN: usize = 240;

/// Builds an HTTP client with a default per-request timeout.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(concat!("profileforge/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Maps a transport error to [`Error::Network`].
#[must_use]
pub fn network_error(error: &reqwest::Error, url: &str) -> Error {
    Error::Network {
        kind: NetworkFailure::classify(error),
        url: url.to_string(),
    }
}

/// Passes success responses through and turns the rest into [`Error::Rejected`].
///
/// # Errors
///
/// Returns [`Error::Rejected`] for any non-2xx status.
pub async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    // The body may be unreadable; the status alone is still a rejection.
    let body = response.text().await.unwrap_or_default();
    Err(Error::rejected(status.as_u16(), extract_message(&body)))
}

/// Pulls a human-readable message out of a JSON error body.
///
/// Understands RFC 6749 (`error_description` / `error`), plain `message`
/// bodies, and `errors[0].description` envelopes. Non-JSON bodies (HTML
/// error pages) yield `None`.
#[must_use]
pub fn extract_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let candidates = [
        value.get("error_description"),
        value.get("message"),
        value
            .get("errors")
            .and_then(|e| e.get(0))
            .and_then(|e| e.get("description")),
        value.get("error"),
    ];
    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(|s| s.chars().take(MAX_MESSAGE_LEN).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_oauth_error() {
        assert_eq!(
            extract_message(r#"{"error":"invalid_client","error_description":"Bad secret"}"#),
            Some("Bad secret".to_string())
        );
        assert_eq!(
            extract_message(r#"{"error":"invalid_client"}"#),
            Some("invalid_client".to_string())
        );
    }

    #[test]
    fn test_extract_envelope() {
        assert_eq!(
            extract_message(r#"{"httpStatus":401,"errors":[{"code":"INVALID","description":"Unauthorized"}]}"#),
            Some("Unauthorized".to_string())
        );
    }

    #[test]
    fn test_extract_ignores_html() {
        assert_eq!(extract_message("<html><body>Not Found</body></html>"), None);
        assert_eq!(extract_message(""), None);
        assert_eq!(extract_message(r#"{"message":"   "}"#), None);
    }
}
