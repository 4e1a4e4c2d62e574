//! Authenticated sessions.

use chrono::{DateTime, Utc};
use profileforge_auth::Token;
use url::Url;

use crate::account::AccountId;

/// Connection state of one account.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No session. Initial state.
    #[default]
    Disconnected,
    /// Probe and exchange in progress.
    Connecting,
    /// A session was established and persisted.
    Connected,
    /// The last attempt failed; carries the user-facing message.
    Failed(String),
}

impl ConnectionState {
    /// Returns `true` while an attempt is running.
    #[must_use]
    pub const fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting)
    }
}

/// A bearer token bound to an account and server.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    account_id: AccountId,
    server: Url,
    token: Token,
}

impl Session {
    /// Creates a session.
    #[must_use]
    pub const fn new(account_id: AccountId, server: Url, token: Token) -> Self {
        Self {
            account_id,
            server,
            token,
        }
    }

    /// Account the session belongs to.
    #[must_use]
    pub const fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// Server base URL.
    #[must_use]
    pub const fn server(&self) -> &Url {
        &self.server
    }

    /// Token expiry.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.token.expires_at
    }

    /// Returns `true` once the token is within its expiry buffer.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.token.is_expired()
    }

    /// Value for the `Authorization` header.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        self.token.authorization_header()
    }

    /// The underlying token.
    #[must_use]
    pub const fn token(&self) -> &Token {
        &self.token
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("account_id", &self.account_id)
            .field("server", &self.server.as_str())
            .field("expires_at", &self.token.expires_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_debug_hides_token() {
        let session = Session::new(
            AccountId::new(1),
            Url::parse("https://acme.example.com/").unwrap(),
            Token::new("s3cr3t-bearer", Utc::now() + Duration::minutes(20)),
        );
        let debug = format!("{session:?}");
        assert!(!debug.contains("s3cr3t-bearer"));
        assert!(debug.contains("acme.example.com"));
        assert_eq!(session.authorization_header(), "Bearer s3cr3t-bearer");
        assert!(!session.is_expired());
    }
}
