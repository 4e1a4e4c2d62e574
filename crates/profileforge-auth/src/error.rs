//! Error types for probing and token exchange.

use std::fmt;

/// Result type alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Network-layer failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFailure {
    /// The attempt exceeded its timeout.
    Timeout,
    /// Connection could not be established (DNS, refused, TLS handshake).
    Connect,
    /// Any other transport failure before a response arrived.
    Transport,
}

impl NetworkFailure {
    /// Classifies a transport error from `reqwest`.
    #[must_use]
    pub fn classify(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::Connect
        } else {
            Self::Transport
        }
    }
}

impl fmt::Display for NetworkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out"),
            Self::Connect => write!(f, "connection failed"),
            Self::Transport => write!(f, "transport error"),
        }
    }
}

/// Auth error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP client construction error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// The server answered with a non-success status.
    #[error("Server rejected request with status {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body, if any.
        message: Option<String>,
    },

    /// No response arrived (timeout, DNS, TLS, refused connection).
    #[error("Network failure at {url}: {kind}")]
    Network {
        /// Failure kind.
        kind: NetworkFailure,
        /// URL being requested.
        url: String,
    },

    /// Every probe candidate failed at the network layer.
    #[error("Server unreachable after {attempts} attempt(s)")]
    Unreachable {
        /// Number of probe attempts made.
        attempts: usize,
    },

    /// Response body did not match any known token shape.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The surface lists no candidate endpoints for the requested operation.
    #[error("No candidate endpoints configured for {0}")]
    NoCandidates(String),
}

impl Error {
    /// Creates a rejection error.
    #[must_use]
    pub fn rejected(status: u16, message: Option<String>) -> Self {
        Self::Rejected { status, message }
    }

    /// Returns the HTTP status for rejections.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if no response was received.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Unreachable { .. })
    }

    /// Ranks how much this error tells the user about the real cause.
    ///
    /// A 4xx carrying a server message outranks a bare 4xx, which outranks
    /// "endpoint not here" statuses, 5xx, malformed bodies and finally
    /// network failures.
    #[must_use]
    pub fn specificity(&self) -> u8 {
        match self {
            Self::Rejected { status, message } => {
                let with_message = u8::from(message.is_some());
                match status {
                    404 | 405 => 40 + with_message,
                    400..=499 => 60 + with_message * 10,
                    _ => 30 + with_message,
                }
            }
            Self::InvalidResponse(_) | Self::Json(_) => 20,
            Self::Network { .. } | Self::Http(_) => 10,
            Self::Unreachable { .. } => 5,
            Self::Url(_) | Self::InvalidConfig(_) | Self::NoCandidates(_) => 0,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn network() -> Error {
        Error::Network {
            kind: NetworkFailure::Timeout,
            url: "https://acme.example.com/api/oauth/token".into(),
        }
    }

    #[test]
    fn test_rejection_with_message_beats_bare_rejection() {
        let with_message = Error::rejected(401, Some("invalid_client".into()));
        let bare = Error::rejected(401, None);
        assert!(with_message.specificity() > bare.specificity());
    }

    #[test]
    fn test_client_error_beats_not_found_and_network() {
        let unauthorized = Error::rejected(401, None);
        let not_found = Error::rejected(404, Some("Not Found".into()));
        assert!(unauthorized.specificity() > not_found.specificity());
        assert!(not_found.specificity() > network().specificity());
    }

    #[test]
    fn test_server_error_beats_network() {
        assert!(Error::rejected(503, None).specificity() > network().specificity());
    }

    #[test]
    fn test_display_includes_message() {
        let err = Error::rejected(400, Some("invalid_grant".into()));
        assert_eq!(
            err.to_string(),
            "Server rejected request with status 400: invalid_grant"
        );
        assert_eq!(
            Error::rejected(404, None).to_string(),
            "Server rejected request with status 404"
        );
    }

    #[test]
    fn test_is_network() {
        assert!(network().is_network());
        assert!(Error::Unreachable { attempts: 3 }.is_network());
        assert!(!Error::rejected(403, None).is_network());
    }
}
