//! Error types for the core library.

use profileforge_auth::NetworkFailure;
use profileforge_profile::{ValidationPass, ValidationReport};
use thiserror::Error;

use crate::account::{AccountId, CredentialError, ValidationError};

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Every probe candidate failed at the network layer.
    #[error("Cannot reach {server} ({attempts} attempt(s){})", .last_failure.map(|k| format!(", last: {k}")).unwrap_or_default())]
    Connectivity {
        /// Server that was probed.
        server: String,
        /// Number of probe attempts.
        attempts: usize,
        /// Failure kind of the last attempt.
        last_failure: Option<NetworkFailure>,
    },

    /// Every exchange candidate rejected the credentials.
    #[error("Authentication failed: {0}")]
    Authentication(#[source] profileforge_auth::Error),

    /// Secret storage read or write failed.
    #[error("Credential storage error: {0}")]
    Storage(#[from] CredentialError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The document failed validation.
    #[error("Profile failed {pass} validation: {}", .report.first_error().map(|e| e.message.as_str()).unwrap_or("unknown error"))]
    Validation {
        /// First pass that reported an error.
        pass: ValidationPass,
        /// Full report.
        report: Box<ValidationReport>,
    },

    /// An authenticated call got 401 after a successful authentication.
    #[error("Session expired; sign in again")]
    SessionExpired,

    /// The server rejected a submission.
    #[error("Submission rejected with status {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Submission {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body, if any.
        message: Option<String>,
    },

    /// A submission got no response.
    #[error("Submission failed: {0}")]
    Transport(#[source] profileforge_auth::Error),

    /// A connection attempt for the account is already running.
    #[error("Account {0} is already connecting")]
    AlreadyConnecting(AccountId),

    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Account metadata is invalid.
    #[error("Invalid account: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    InvalidAccount(Vec<ValidationError>),

    /// Profile encoding or export error.
    #[error("Profile error: {0}")]
    Profile(#[from] profileforge_profile::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Builds a validation error from a failing report.
    #[must_use]
    pub fn validation(report: ValidationReport) -> Self {
        let pass = report
            .first_error()
            .map_or(ValidationPass::Structural, |e| e.pass);
        Self::Validation {
            pass,
            report: Box::new(report),
        }
    }

    /// Returns `true` for secret-storage and database failures.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Database(_))
    }

    /// Single message for the user after a failed connect.
    ///
    /// Connectivity and authentication failures carry the most specific
    /// cause; everything else falls back to `Display`.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Connectivity {
                server,
                last_failure,
                ..
            } => match last_failure {
                Some(NetworkFailure::Timeout) => {
                    format!("{server} did not respond in time. Check the address and your network.")
                }
                Some(_) | None => {
                    format!("Could not connect to {server}. Check the address and your network.")
                }
            },
            Self::Authentication(cause) => match cause {
                profileforge_auth::Error::Rejected {
                    status: 401 | 403,
                    message: None,
                } => "The server rejected the credentials.".to_string(),
                profileforge_auth::Error::Rejected {
                    message: Some(message),
                    ..
                } => format!("Sign-in failed: {message}"),
                other => format!("Sign-in failed: {other}"),
            },
            Self::Storage(_) | Self::Database(_) => {
                "Credentials could not be saved; you are signed out.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

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

    #[test]
    fn test_connectivity_message() {
        let err = Error::Connectivity {
            server: "https://acme.example.com/".into(),
            attempts: 3,
            last_failure: Some(NetworkFailure::Timeout),
        };
        assert_eq!(
            err.to_string(),
            "Cannot reach https://acme.example.com/ (3 attempt(s), last: timed out)"
        );
        assert!(err.user_message().contains("did not respond"));
    }

    #[test]
    fn test_authentication_message_prefers_server_text() {
        let err = Error::Authentication(profileforge_auth::Error::rejected(
            400,
            Some("invalid_client".into()),
        ));
        assert_eq!(err.user_message(), "Sign-in failed: invalid_client");

        let err = Error::Authentication(profileforge_auth::Error::rejected(401, None));
        assert_eq!(err.user_message(), "The server rejected the credentials.");
    }

    #[test]
    fn test_submission_display() {
        let err = Error::Submission {
            status: 500,
            message: Some("boom".into()),
        };
        assert_eq!(err.to_string(), "Submission rejected with status 500: boom");
    }

    #[test]
    fn test_storage_classification() {
        let err = Error::Storage(CredentialError::Unavailable("locked".into()));
        assert!(err.is_storage());
        assert!(!Error::SessionExpired.is_storage());
    }
}
