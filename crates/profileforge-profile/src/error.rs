//! Error types for profile operations.

use crate::validator::ValidationReport;

/// Result type alias for profile operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Profile error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Property-list encoding or decoding failed.
    #[error("Property list error: {0}")]
    Plist(#[from] plist::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Template JSON could not be parsed.
    #[error("Invalid template: {0}")]
    InvalidTemplate(#[from] serde_json::Error),

    /// Decoded document is missing a required key or has the wrong shape.
    #[error("Malformed profile: {0}")]
    Malformed(String),

    /// The document failed validation and cannot be exported.
    #[error("Profile failed validation with {} error(s)", .0.errors.len())]
    Validation(Box<ValidationReport>),
}
