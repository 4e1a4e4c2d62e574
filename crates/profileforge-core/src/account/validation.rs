//! Account validation.

use super::model::Account;
use url::Url;

/// Validation error for account configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Account name is empty.
    EmptyName,
    /// Server address is empty.
    EmptyServer,
    /// Server address is not a URL with a host.
    InvalidServer,
    /// Server address uses plain HTTP on a non-local host.
    InsecureServer,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyName => "Account name is required",
            Self::EmptyServer => "Server address is required",
            Self::InvalidServer => "Server address must be a URL such as https://mdm.example.com",
            Self::InsecureServer => "Server address must use https",
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyName => "name",
            Self::EmptyServer | Self::InvalidServer | Self::InsecureServer => "server_url",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating an account.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate an account configuration.
///
/// Plain `http` is accepted only for `localhost` and `127.0.0.1`.
///
/// # Errors
///
/// Returns a vector of `ValidationError` if any fields are invalid.
pub fn validate_account(account: &Account) -> ValidationResult {
    let mut errors = Vec::new();

    if account.name.trim().is_empty() {
        errors.push(ValidationError::EmptyName);
    }

    let server = account.server_url.trim();
    if server.is_empty() {
        errors.push(ValidationError::EmptyServer);
    } else {
        match Url::parse(server) {
            Ok(url) if url.host_str().is_some_and(|h| !h.is_empty()) => match url.scheme() {
                "https" => {}
                "http" if is_local(&url) => {}
                "http" => errors.push(ValidationError::InsecureServer),
                _ => errors.push(ValidationError::InvalidServer),
            },
            _ => errors.push(ValidationError::InvalidServer),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_local(url: &Url) -> bool {
    matches!(url.host_str(), Some("localhost" | "127.0.0.1"))
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
    use crate::account::Vendor;

    fn account(name: &str, server: &str) -> Account {
        Account::new(name, Vendor::Jamf, server)
    }

    #[test]
    fn valid_account() {
        assert!(validate_account(&account("Acme", "https://acme.example.com")).is_ok());
        assert!(validate_account(&account("Local", "http://127.0.0.1:8080")).is_ok());
    }

    #[test]
    fn empty_fields() {
        let errors = validate_account(&account(" ", "")).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::EmptyName, ValidationError::EmptyServer]
        );
    }

    #[test]
    fn invalid_server() {
        let errors = validate_account(&account("Acme", "acme.example.com")).unwrap_err();
        assert_eq!(errors, vec![ValidationError::InvalidServer]);
        let errors = validate_account(&account("Acme", "ftp://acme.example.com")).unwrap_err();
        assert_eq!(errors, vec![ValidationError::InvalidServer]);
    }

    #[test]
    fn plain_http_is_rejected_for_remote_hosts() {
        let errors = validate_account(&account("Acme", "http://acme.example.com")).unwrap_err();
        assert_eq!(errors, vec![ValidationError::InsecureServer]);
        assert_eq!(errors[0].field(), "server_url");
    }
}
