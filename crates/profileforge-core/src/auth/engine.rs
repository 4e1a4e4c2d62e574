//! Authentication engine.
//!
//! Per-account state machine:
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──▶ Connected
//!       ▲                        │
//!       └──── reset/logout ◀── Failed
//! ```
//!
//! A connect always probes before exchanging credentials, and persists the
//! token before reporting success.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use profileforge_auth::{ExchangeCredentials, Prober, ProbeReport, TokenExchanger};
use tracing::{debug, info, warn};

use super::session::{ConnectionState, Session};
use crate::account::{AccountId, CredentialStore};
use crate::config::Settings;
use crate::{Error, Result};

type StateMap = Mutex<HashMap<AccountId, ConnectionState>>;

/// Establishes and resumes sessions.
#[derive(Debug)]
pub struct AuthEngine {
    store: Arc<CredentialStore>,
    settings: Settings,
    prober: Prober,
    exchanger: TokenExchanger,
    states: StateMap,
}

impl AuthEngine {
    /// Creates an engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP clients cannot be built.
    pub fn new(store: Arc<CredentialStore>, settings: Settings) -> Result<Self> {
        let prober =
            Prober::new(settings.probe_timeout()).map_err(|e| Error::Config(e.to_string()))?;
        let exchanger = TokenExchanger::new(settings.exchange_timeout())
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self {
            store,
            settings,
            prober,
            exchanger,
            states: Mutex::new(HashMap::new()),
        })
    }

    /// The credential store.
    #[must_use]
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Current state of an account.
    #[must_use]
    pub fn state(&self, account_id: AccountId) -> ConnectionState {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&account_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns a failed account to `Disconnected`.
    pub fn reset(&self, account_id: AccountId) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(states.get(&account_id), Some(ConnectionState::Failed(_))) {
            states.insert(account_id, ConnectionState::Disconnected);
        }
    }

    /// Probes the account's server without authenticating.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountNotFound`] or [`Error::Config`] if the account
    /// cannot be turned into an API surface.
    pub async fn probe(&self, account_id: AccountId) -> Result<ProbeReport> {
        let account = self.store.account(account_id).await?;
        let surface = self.settings.api_surface(&account)?;
        Ok(self.prober.probe(&surface).await)
    }

    /// Authenticates an account.
    ///
    /// Probes the server, exchanges `credentials` against each candidate
    /// token endpoint, persists the token and records the last-used time.
    /// A `Failed` account may connect again directly.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyConnecting`] if an attempt for the account is running
    /// - [`Error::Connectivity`] if nothing answered the probe
    /// - [`Error::Authentication`] with the most specific exchange failure
    /// - [`Error::Storage`] if the token could not be persisted
    pub async fn connect(
        &self,
        account_id: AccountId,
        credentials: &ExchangeCredentials,
    ) -> Result<Session> {
        let mut attempt = self.begin(account_id)?;
        let result = self.run_connect(account_id, credentials).await;
        attempt.finish(match &result {
            Ok(_) => ConnectionState::Connected,
            Err(e) => ConnectionState::Failed(e.user_message()),
        });
        result
    }

    async fn run_connect(
        &self,
        account_id: AccountId,
        credentials: &ExchangeCredentials,
    ) -> Result<Session> {
        if credentials.is_incomplete() {
            return Err(Error::Authentication(profileforge_auth::Error::InvalidConfig(
                format!("{} credentials are incomplete", credentials.mode()),
            )));
        }

        let account = self.store.account(account_id).await?;
        let surface = self.settings.api_surface(&account)?;
        info!("Connecting account {account_id} to {}", surface.base_url);

        let report = self.prober.probe(&surface).await;
        if !report.is_reachable() {
            let last_failure = report.attempts.last().and_then(|a| a.outcome.err());
            return Err(Error::Connectivity {
                server: surface.base_url.to_string(),
                attempts: report.attempts.len(),
                last_failure,
            });
        }

        let exchange = self
            .exchanger
            .exchange(&surface, credentials)
            .await
            .map_err(Error::Authentication)?;

        self.store.store_token(account_id, &exchange.token)?;
        if let Err(e) = self
            .store
            .accounts()
            .touch_last_used(account_id, Utc::now())
            .await
        {
            warn!("Failed to record last use of account {account_id}: {e}");
        }

        info!(
            "Account {account_id} connected via {}, token expires {}",
            exchange.endpoint, exchange.token.expires_at
        );
        Ok(Session::new(account_id, surface.base_url, exchange.token))
    }

    /// Resumes a session from a stored, unexpired token.
    ///
    /// Makes no network calls. Storage failures are logged and reported as
    /// no session.
    pub async fn session(&self, account_id: AccountId) -> Option<Session> {
        let token = match self.store.retrieve_token(account_id) {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("No usable stored token for account {account_id}");
                self.set_state_unless_connecting(account_id, ConnectionState::Disconnected);
                return None;
            }
            Err(e) => {
                warn!("Cannot resume session for account {account_id}: {e}");
                self.set_state_unless_connecting(account_id, ConnectionState::Disconnected);
                return None;
            }
        };

        let server = match self.store.account(account_id).await {
            Ok(account) => match self.settings.api_surface(&account) {
                Ok(surface) => surface.base_url,
                Err(e) => {
                    warn!("Cannot resume session for account {account_id}: {e}");
                    return None;
                }
            },
            Err(e) => {
                warn!("Cannot resume session for account {account_id}: {e}");
                return None;
            }
        };

        self.set_state_unless_connecting(account_id, ConnectionState::Connected);
        Some(Session::new(account_id, server, token))
    }

    /// Signs an account out.
    ///
    /// Invalidates the token remotely when possible (failures are only
    /// logged), deletes it from storage and moves the account to
    /// `Disconnected`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the stored token could not be deleted.
    pub async fn logout(&self, account_id: AccountId) -> Result<()> {
        if let Some(session) = self.session(account_id).await {
            match self.store.account(account_id).await {
                Ok(account) => match self.settings.api_surface(&account) {
                    Ok(surface) => {
                        if let Err(e) = self.exchanger.invalidate(&surface, session.token()).await {
                            debug!("Remote token invalidation for account {account_id} failed: {e}");
                        }
                    }
                    Err(e) => debug!("Skipping remote invalidation: {e}"),
                },
                Err(e) => debug!("Skipping remote invalidation: {e}"),
            }
        }

        self.store.clear_token(account_id)?;
        self.set_state_unless_connecting(account_id, ConnectionState::Disconnected);
        info!("Account {account_id} signed out");
        Ok(())
    }

    fn begin(&self, account_id: AccountId) -> Result<ConnectAttempt<'_>> {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        if states.get(&account_id).is_some_and(ConnectionState::is_connecting) {
            warn!("Rejecting concurrent connect for account {account_id}");
            return Err(Error::AlreadyConnecting(account_id));
        }
        states.insert(account_id, ConnectionState::Connecting);
        Ok(ConnectAttempt {
            states: &self.states,
            account_id,
            outcome: None,
        })
    }

    fn set_state_unless_connecting(&self, account_id: AccountId, state: ConnectionState) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        if !states.get(&account_id).is_some_and(ConnectionState::is_connecting) {
            states.insert(account_id, state);
        }
    }
}

/// Holds an account in `Connecting` until dropped.
///
/// An attempt dropped without an outcome (the connect future was abandoned)
/// leaves the account `Disconnected`.
struct ConnectAttempt<'a> {
    states: &'a StateMap,
    account_id: AccountId,
    outcome: Option<ConnectionState>,
}

impl ConnectAttempt<'_> {
    fn finish(&mut self, state: ConnectionState) {
        self.outcome = Some(state);
    }
}

impl Drop for ConnectAttempt<'_> {
    fn drop(&mut self) {
        let state = self.outcome.take().unwrap_or_default();
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.account_id, state);
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
    use crate::account::{Account, AccountRepository, MemoryBackend, Vendor};
    use chrono::Duration;
    use profileforge_auth::Token;
    use serde_json::json;
    use std::time::Duration as StdDuration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Harness {
        engine: Arc<AuthEngine>,
        backend: Arc<MemoryBackend>,
        account_id: AccountId,
    }

    fn settings() -> Settings {
        Settings::builder()
            .probe_timeout(StdDuration::from_secs(2))
            .exchange_timeout(StdDuration::from_secs(2))
            .probe_paths(vec!["api/v1/ping".into()])
            .token_paths(
                profileforge_auth::ExchangeMode::ClientCredentials,
                vec!["api/oauth/token".into(), "api/v1/oauth/token".into()],
            )
            .invalidate_paths(vec!["api/v1/auth/invalidate-token".into()])
            .build()
    }

    async fn harness(server: &str) -> Harness {
        let backend = Arc::new(MemoryBackend::new());
        let repo = AccountRepository::in_memory().await.unwrap();
        let store = Arc::new(CredentialStore::new(repo, backend.clone()));
        let mut account = Account::new("Acme", Vendor::Jamf, server);
        let account_id = store.store(&mut account).await.unwrap();
        let engine = Arc::new(AuthEngine::new(store, settings()).unwrap());
        Harness {
            engine,
            backend,
            account_id,
        }
    }

    async fn mount_ping(server: &MockServer, status: u16) {
        Mock::given(method("GET"))
            .and(path("/api/v1/ping"))
            .respond_with(ResponseTemplate::new(status))
            .mount(server)
            .await;
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok",
                "token_type": "Bearer",
                "expires_in": 1199
            })))
            .mount(server)
            .await;
    }

    fn creds() -> ExchangeCredentials {
        ExchangeCredentials::client_credentials("x", "y")
    }

    fn dead_address() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_connect_persists_token() {
        let server = MockServer::start().await;
        mount_ping(&server, 401).await;
        mount_token(&server).await;
        let h = harness(&server.uri()).await;

        assert_eq!(h.engine.state(h.account_id), ConnectionState::Disconnected);
        let session = h.engine.connect(h.account_id, &creds()).await.unwrap();

        assert_eq!(session.authorization_header(), "Bearer tok");
        assert_eq!(h.engine.state(h.account_id), ConnectionState::Connected);
        let stored = h.engine.store().retrieve_token(h.account_id).unwrap().unwrap();
        assert_eq!(&stored, session.token());
        let account = h.engine.store().account(h.account_id).await.unwrap();
        assert!(account.last_used_at.is_some());
    }

    #[tokio::test]
    async fn test_unreachable_server_never_exchanges() {
        let h = harness(&dead_address()).await;

        let err = h.engine.connect(h.account_id, &creds()).await.unwrap_err();
        assert!(matches!(err, Error::Connectivity { attempts: 1, .. }));
        assert!(matches!(
            h.engine.state(h.account_id),
            ConnectionState::Failed(_)
        ));
        assert!(h.backend.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let server = MockServer::start().await;
        mount_ping(&server, 200).await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_client"})),
            )
            .mount(&server)
            .await;
        let h = harness(&server.uri()).await;

        let err = h.engine.connect(h.account_id, &creds()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Authentication(profileforge_auth::Error::Rejected { status: 401, .. })
        ));
        assert_eq!(
            h.engine.state(h.account_id),
            ConnectionState::Failed("Sign-in failed: invalid_client".into())
        );
    }

    #[tokio::test]
    async fn test_incomplete_credentials_fail_without_network() {
        let h = harness(&dead_address()).await;
        let err = h
            .engine
            .connect(h.account_id, &ExchangeCredentials::client_credentials("x", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[tokio::test]
    async fn test_storage_failure_degrades_to_failed() {
        let server = MockServer::start().await;
        mount_ping(&server, 200).await;
        mount_token(&server).await;
        let h = harness(&server.uri()).await;
        h.backend.set_unavailable(true);

        let err = h.engine.connect(h.account_id, &creds()).await.unwrap_err();
        assert!(err.is_storage());
        assert!(matches!(
            h.engine.state(h.account_id),
            ConnectionState::Failed(_)
        ));
        assert!(h.engine.session(h.account_id).await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_connect_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/ping"))
            .respond_with(ResponseTemplate::new(200).set_delay(StdDuration::from_millis(300)))
            .mount(&server)
            .await;
        mount_token(&server).await;
        let h = harness(&server.uri()).await;

        let engine = h.engine.clone();
        let id = h.account_id;
        let first = tokio::spawn(async move { engine.connect(id, &creds()).await });
        tokio::time::sleep(StdDuration::from_millis(50)).await;

        assert_eq!(h.engine.state(id), ConnectionState::Connecting);
        let second = h.engine.connect(id, &creds()).await.unwrap_err();
        assert!(matches!(second, Error::AlreadyConnecting(_)));

        first.await.unwrap().unwrap();
        assert_eq!(h.engine.state(id), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_abandoned_connect_returns_to_disconnected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/ping"))
            .respond_with(ResponseTemplate::new(200).set_delay(StdDuration::from_secs(1)))
            .mount(&server)
            .await;
        let h = harness(&server.uri()).await;

        let abandoned = tokio::time::timeout(
            StdDuration::from_millis(50),
            h.engine.connect(h.account_id, &creds()),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(h.engine.state(h.account_id), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_failed_account_can_retry() {
        let server = MockServer::start().await;
        mount_ping(&server, 200).await;
        let h = harness(&server.uri()).await;

        assert!(h.engine.connect(h.account_id, &creds()).await.is_err());
        mount_token(&server).await;
        h.engine.connect(h.account_id, &creds()).await.unwrap();
        assert_eq!(h.engine.state(h.account_id), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_reset_only_clears_failures() {
        let h = harness(&dead_address()).await;
        h.engine.reset(h.account_id);
        assert_eq!(h.engine.state(h.account_id), ConnectionState::Disconnected);

        let _ = h.engine.connect(h.account_id, &creds()).await;
        h.engine.reset(h.account_id);
        assert_eq!(h.engine.state(h.account_id), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_session_resumes_from_stored_token() {
        let h = harness("https://acme.example.com").await;
        assert!(h.engine.session(h.account_id).await.is_none());

        let token = Token::new("stored", Utc::now() + Duration::minutes(10));
        h.engine.store().store_token(h.account_id, &token).unwrap();

        let session = h.engine.session(h.account_id).await.unwrap();
        assert_eq!(session.token(), &token);
        assert_eq!(session.server().as_str(), "https://acme.example.com/");
        assert_eq!(h.engine.state(h.account_id), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_logout_clears_token_and_invalidates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/invalidate-token"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        let h = harness(&server.uri()).await;
        let token = Token::new("stored", Utc::now() + Duration::minutes(10));
        h.engine.store().store_token(h.account_id, &token).unwrap();

        h.engine.logout(h.account_id).await.unwrap();
        assert!(h.backend.is_empty());
        assert_eq!(h.engine.state(h.account_id), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_logout_tolerates_invalidation_failure() {
        let h = harness(&dead_address()).await;
        let token = Token::new("stored", Utc::now() + Duration::minutes(10));
        h.engine.store().store_token(h.account_id, &token).unwrap();

        h.engine.logout(h.account_id).await.unwrap();
        assert!(h.engine.session(h.account_id).await.is_none());
    }
}
