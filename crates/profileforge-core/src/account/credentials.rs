//! Secure secret storage.
//!
//! Secrets are kept apart from account metadata, under keys of the form
//! `profileforge_<kind>_<account id>`. The default backend is the platform's
//! native credential storage:
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - macOS: Keychain
//! - Windows: Credential Manager

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use keyring::Entry;
use tracing::debug;

use super::AccountId;

/// Service name used for keyring entries.
pub const SERVICE_NAME: &str = "profileforge";

/// Kind of secret stored for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretKind {
    /// Bearer token from the last successful exchange.
    Token,
    /// Client secret or password used for exchange.
    ExchangeCredentials,
}

impl SecretKind {
    /// Every kind, for purges.
    pub const ALL: [Self; 2] = [Self::Token, Self::ExchangeCredentials];

    const fn as_str(self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::ExchangeCredentials => "exchange",
        }
    }
}

/// Error type for credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Failed to access keyring.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// A stored secret could not be encoded or decoded.
    #[error("Stored secret is unreadable: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The backend is unavailable.
    #[error("Secret storage unavailable: {0}")]
    Unavailable(String),
}

/// Result type for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// Generates the storage key for a secret.
#[must_use]
pub fn credential_key(account_id: AccountId, kind: SecretKind) -> String {
    format!("{SERVICE_NAME}_{}_{}", kind.as_str(), account_id.0)
}

/// Key-value store for secret strings.
pub trait SecretBackend: Send + Sync {
    /// Stores a secret, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    fn set(&self, key: &str, secret: &str) -> CredentialResult<()>;

    /// Reads a secret. Missing entries are `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> CredentialResult<Option<String>>;

    /// Deletes a secret. Deleting a missing entry succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the delete.
    fn delete(&self, key: &str) -> CredentialResult<()>;
}

/// System keyring backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyringBackend;

impl SecretBackend for KeyringBackend {
    fn set(&self, key: &str, secret: &str) -> CredentialResult<()> {
        let entry = Entry::new(SERVICE_NAME, key)?;
        entry.set_password(secret)?;
        debug!("Stored keyring entry {key}");
        Ok(())
    }

    fn get(&self, key: &str) -> CredentialResult<Option<String>> {
        let entry = Entry::new(SERVICE_NAME, key)?;
        match entry.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => {
                debug!("No keyring entry {key}");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, key: &str) -> CredentialResult<()> {
        let entry = Entry::new(SERVICE_NAME, key)?;
        match entry.delete_credential() {
            Ok(()) => {
                debug!("Deleted keyring entry {key}");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process backend for tests and throwaway sessions.
///
/// Can be switched into a failing mode to exercise storage-error paths.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation fail with [`CredentialError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> CredentialResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(CredentialError::Unavailable("memory backend disabled".into()))
        } else {
            Ok(())
        }
    }
}

impl SecretBackend for MemoryBackend {
    fn set(&self, key: &str, secret: &str) -> CredentialResult<()> {
        self.check()?;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), secret.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> CredentialResult<Option<String>> {
        self.check()?;
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn delete(&self, key: &str) -> CredentialResult<()> {
        self.check()?;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
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

    #[test]
    fn test_credential_key() {
        assert_eq!(
            credential_key(AccountId::new(7), SecretKind::Token),
            "profileforge_token_7"
        );
        assert_eq!(
            credential_key(AccountId::new(7), SecretKind::ExchangeCredentials),
            "profileforge_exchange_7"
        );
    }

    #[test]
    fn test_memory_backend() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("k").unwrap(), None);
        backend.set("k", "v").unwrap();
        assert_eq!(backend.get("k").unwrap(), Some("v".to_string()));
        backend.delete("k").unwrap();
        backend.delete("k").unwrap();
        assert!(backend.is_empty());
    }

    #[test]
    fn test_memory_backend_unavailable() {
        let backend = MemoryBackend::new();
        backend.set_unavailable(true);
        assert!(matches!(
            backend.set("k", "v"),
            Err(CredentialError::Unavailable(_))
        ));
        backend.set_unavailable(false);
        backend.set("k", "v").unwrap();
        assert_eq!(backend.len(), 1);
    }

    // These tests interact with the actual system keyring.
    // Run manually with `cargo test -- --ignored`

    #[test]
    #[ignore = "Interacts with system keyring"]
    fn test_keyring_store_and_retrieve() {
        let backend = KeyringBackend;
        let key = credential_key(AccountId::new(99999), SecretKind::Token);

        backend.set(&key, "test_token_12345").unwrap();
        assert_eq!(backend.get(&key).unwrap(), Some("test_token_12345".to_string()));

        backend.delete(&key).unwrap();
        assert_eq!(backend.get(&key).unwrap(), None);
    }

    #[test]
    #[ignore = "Interacts with system keyring"]
    fn test_keyring_delete_missing_entry() {
        let backend = KeyringBackend;
        let key = credential_key(AccountId::new(99998), SecretKind::ExchangeCredentials);
        backend.delete(&key).unwrap();
    }
}
