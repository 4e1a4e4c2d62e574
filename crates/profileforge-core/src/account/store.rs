//! Credential store: account metadata plus secrets.

use std::sync::Arc;

use profileforge_auth::{ExchangeCredentials, Token};
use tracing::{debug, info, warn};

use super::credentials::{CredentialResult, KeyringBackend, SecretBackend, SecretKind, credential_key};
use super::model::{Account, AccountId};
use super::repository::AccountRepository;
use super::validation::validate_account;
use crate::{Error, Result};

/// Facade over the account repository and the secret backend.
///
/// Metadata goes to SQLite, secrets to the backend; both are keyed by the
/// same [`AccountId`]. No method logs secret values.
#[derive(Clone)]
pub struct CredentialStore {
    accounts: AccountRepository,
    secrets: Arc<dyn SecretBackend>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("accounts", &self.accounts)
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Creates a store from its parts.
    #[must_use]
    pub fn new(accounts: AccountRepository, secrets: Arc<dyn SecretBackend>) -> Self {
        Self { accounts, secrets }
    }

    /// Opens the on-disk database with the system keyring.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub async fn open(database_path: &str) -> Result<Self> {
        let accounts = AccountRepository::new(database_path).await?;
        Ok(Self::new(accounts, Arc::new(KeyringBackend)))
    }

    /// The metadata repository.
    #[must_use]
    pub const fn accounts(&self) -> &AccountRepository {
        &self.accounts
    }

    /// Validates and saves account metadata.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAccount`] if validation fails, or a database error.
    pub async fn store(&self, account: &mut Account) -> Result<AccountId> {
        validate_account(account).map_err(Error::InvalidAccount)?;
        self.accounts.save(account).await?;
        let id = account
            .id
            .ok_or_else(|| Error::Config("saved account has no id".into()))?;
        info!("Stored account {id} ({})", account.name);
        Ok(id)
    }

    /// Loads an account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountNotFound`] if there is no such account.
    pub async fn account(&self, id: AccountId) -> Result<Account> {
        self.accounts
            .get(id)
            .await?
            .ok_or(Error::AccountNotFound(id))
    }

    /// Persists a bearer token for an account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backend rejects the write.
    pub fn store_token(&self, id: AccountId, token: &Token) -> Result<()> {
        let json = serde_json::to_string(token).map_err(super::CredentialError::from)?;
        self.secrets
            .set(&credential_key(id, SecretKind::Token), &json)
            .inspect_err(|e| warn!("Failed to store token for account {id}: {e}"))?;
        debug!("Stored token for account {id}, expires {}", token.expires_at);
        Ok(())
    }

    /// Returns the stored token if it has not expired.
    ///
    /// An expired token is reported as absent even though the raw value
    /// remains in the backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backend cannot be read or the
    /// stored value is unreadable.
    pub fn retrieve_token(&self, id: AccountId) -> Result<Option<Token>> {
        let Some(json) = self
            .secrets
            .get(&credential_key(id, SecretKind::Token))
            .inspect_err(|e| warn!("Failed to read token for account {id}: {e}"))?
        else {
            return Ok(None);
        };
        let token: Token = serde_json::from_str(&json).map_err(super::CredentialError::from)?;
        if token.is_expired() {
            debug!("Stored token for account {id} expired at {}", token.expires_at);
            return Ok(None);
        }
        Ok(Some(token))
    }

    /// Deletes the stored token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backend rejects the delete.
    pub fn clear_token(&self, id: AccountId) -> Result<()> {
        self.secrets.delete(&credential_key(id, SecretKind::Token))?;
        debug!("Cleared token for account {id}");
        Ok(())
    }

    /// Persists exchange credentials so the account can re-authenticate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backend rejects the write.
    pub fn store_exchange_credentials(
        &self,
        id: AccountId,
        credentials: &ExchangeCredentials,
    ) -> Result<()> {
        let json = serde_json::to_string(credentials).map_err(super::CredentialError::from)?;
        self.secrets
            .set(&credential_key(id, SecretKind::ExchangeCredentials), &json)?;
        debug!(
            "Stored {} credentials for account {id}",
            credentials.mode()
        );
        Ok(())
    }

    /// Loads stored exchange credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backend cannot be read.
    pub fn load_exchange_credentials(&self, id: AccountId) -> Result<Option<ExchangeCredentials>> {
        let Some(json) = self
            .secrets
            .get(&credential_key(id, SecretKind::ExchangeCredentials))?
        else {
            return Ok(None);
        };
        let credentials = serde_json::from_str(&json).map_err(super::CredentialError::from)?;
        Ok(Some(credentials))
    }

    /// Deletes an account's metadata and every secret stored for it.
    ///
    /// Secrets go first. If any of them cannot be deleted the metadata row
    /// is kept, so the account stays listed and a retry or [`Self::wipe_all`]
    /// can still reach its secrets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if a secret could not be deleted,
    /// [`Error::AccountNotFound`] if there is no such account, or a database
    /// error.
    pub async fn delete_account(&self, id: AccountId) -> Result<()> {
        self.delete_secrets(id)
            .inspect_err(|e| warn!("Failed to delete secrets for account {id}: {e}"))?;
        if !self.accounts.delete(id).await? {
            return Err(Error::AccountNotFound(id));
        }
        info!("Deleted account {id}");
        Ok(())
    }

    /// Removes every account and every secret in this system's namespace.
    ///
    /// Accounts whose secrets could not be deleted keep their metadata row
    /// so a later wipe can finish the job. Returns the number of accounts
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or deleting accounts fails, or if any
    /// secret could not be deleted.
    pub async fn wipe_all(&self) -> Result<u64> {
        let accounts = self.accounts.list().await?;
        let mut cleared = Vec::with_capacity(accounts.len());
        let mut first_failure = None;
        for id in accounts.iter().filter_map(|a| a.id) {
            match self.delete_secrets(id) {
                Ok(()) => cleared.push(id),
                Err(e) => {
                    warn!("Failed to delete secrets for account {id}: {e}");
                    first_failure.get_or_insert(e);
                }
            }
        }

        let removed = if first_failure.is_none() {
            self.accounts.delete_all().await?
        } else {
            let mut removed = 0;
            for id in cleared {
                if self.accounts.delete(id).await? {
                    removed += 1;
                }
            }
            removed
        };
        info!("Wiped {removed} account(s)");
        match first_failure {
            Some(e) => Err(e.into()),
            None => Ok(removed),
        }
    }

    fn delete_secrets(&self, id: AccountId) -> CredentialResult<()> {
        for kind in SecretKind::ALL {
            self.secrets.delete(&credential_key(id, kind))?;
        }
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
    use crate::account::{MemoryBackend, Vendor};
    use chrono::{Duration, Utc};

    async fn store() -> (CredentialStore, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let repo = AccountRepository::in_memory().await.unwrap();
        (CredentialStore::new(repo, backend.clone()), backend)
    }

    async fn acme(store: &CredentialStore) -> AccountId {
        let mut account = Account::new("Acme", Vendor::Jamf, "https://acme.example.com");
        store.store(&mut account).await.unwrap()
    }

    #[tokio::test]
    async fn test_store_validates() {
        let (store, _) = store().await;
        let mut account = Account::new("", Vendor::Jamf, "http://acme.example.com");
        let err = store.store(&mut account).await.unwrap_err();
        assert!(matches!(err, Error::InvalidAccount(ref errors) if errors.len() == 2));
        assert!(account.id.is_none());
    }

    #[tokio::test]
    async fn test_token_round_trip() {
        let (store, _) = store().await;
        let id = acme(&store).await;
        let token = Token::new("abc", Utc::now() + Duration::minutes(20));

        store.store_token(id, &token).unwrap();
        assert_eq!(store.retrieve_token(id).unwrap(), Some(token));
    }

    #[tokio::test]
    async fn test_expired_token_is_absent_but_still_stored() {
        let (store, backend) = store().await;
        let id = acme(&store).await;
        let token = Token::new("abc", Utc::now() - Duration::minutes(1));

        store.store_token(id, &token).unwrap();
        assert_eq!(store.retrieve_token(id).unwrap(), None);
        assert!(
            backend
                .get(&credential_key(id, SecretKind::Token))
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_storage_failure_is_an_error_not_a_panic() {
        let (store, backend) = store().await;
        let id = acme(&store).await;
        backend.set_unavailable(true);

        let token = Token::new("abc", Utc::now() + Duration::minutes(20));
        assert!(store.store_token(id, &token).unwrap_err().is_storage());
        assert!(store.retrieve_token(id).unwrap_err().is_storage());
    }

    #[tokio::test]
    async fn test_exchange_credentials_round_trip() {
        let (store, _) = store().await;
        let id = acme(&store).await;
        let creds = ExchangeCredentials::client_credentials("x", "y");

        assert!(store.load_exchange_credentials(id).unwrap().is_none());
        store.store_exchange_credentials(id, &creds).unwrap();
        assert_eq!(store.load_exchange_credentials(id).unwrap(), Some(creds));
    }

    #[tokio::test]
    async fn test_delete_account_removes_secrets() {
        let (store, backend) = store().await;
        let id = acme(&store).await;
        store
            .store_token(id, &Token::new("abc", Utc::now() + Duration::minutes(20)))
            .unwrap();
        store
            .store_exchange_credentials(id, &ExchangeCredentials::basic("admin", "pw"))
            .unwrap();

        store.delete_account(id).await.unwrap();
        assert!(backend.is_empty());
        assert!(matches!(
            store.account(id).await.unwrap_err(),
            Error::AccountNotFound(_)
        ));
        assert!(matches!(
            store.delete_account(id).await.unwrap_err(),
            Error::AccountNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_wipe_all() {
        let (store, backend) = store().await;
        let a = acme(&store).await;
        let mut beta = Account::new("Beta", Vendor::Mosyle, "https://beta.example.com");
        let b = store.store(&mut beta).await.unwrap();
        for id in [a, b] {
            store
                .store_token(id, &Token::new("abc", Utc::now() + Duration::minutes(20)))
                .unwrap();
        }

        assert_eq!(store.wipe_all().await.unwrap(), 2);
        assert!(backend.is_empty());
        assert!(store.accounts().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_account_keeps_metadata_when_secrets_remain() {
        let (store, backend) = store().await;
        let id = acme(&store).await;
        store
            .store_token(id, &Token::new("abc", Utc::now() + Duration::minutes(20)))
            .unwrap();

        backend.set_unavailable(true);
        assert!(store.delete_account(id).await.unwrap_err().is_storage());
        backend.set_unavailable(false);
        assert_eq!(store.account(id).await.unwrap().name, "Acme");
        assert_eq!(backend.len(), 1);

        assert_eq!(store.wipe_all().await.unwrap(), 1);
        assert!(backend.is_empty());
        assert!(store.accounts().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_wipe_can_be_retried() {
        let (store, backend) = store().await;
        let id = acme(&store).await;
        store
            .store_token(id, &Token::new("abc", Utc::now() + Duration::minutes(20)))
            .unwrap();

        backend.set_unavailable(true);
        assert!(store.wipe_all().await.unwrap_err().is_storage());
        backend.set_unavailable(false);
        assert_eq!(store.accounts().list().await.unwrap().len(), 1);

        assert_eq!(store.wipe_all().await.unwrap(), 1);
        assert!(backend.is_empty());
    }
}
