//! Bearer token types and response normalization.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifetime assumed when the server does not state an expiry.
pub const DEFAULT_LIFETIME_SECS: i64 = 20 * 60;

/// Tokens are treated as expired this many seconds early.
pub const EXPIRY_BUFFER_SECS: i64 = 60;

/// Bearer token with expiry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Access token string.
    pub access_token: String,
    /// Token type (usually "Bearer").
    pub token_type: String,
    /// Expiration time.
    pub expires_at: DateTime<Utc>,
    /// Scope granted by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Token {
    /// Creates a bearer token.
    #[must_use]
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "Bearer".to_string(),
            expires_at,
            scope: None,
        }
    }

    /// Creates a token from any of the known response shapes.
    ///
    /// # Errors
    ///
    /// Returns an error if the response carries an empty token.
    pub fn from_response(response: TokenResponse) -> Result<Self> {
        Self::from_response_at(response, Utc::now())
    }

    /// Like [`Token::from_response`] with an explicit issue time.
    ///
    /// # Errors
    ///
    /// Returns an error if the response carries an empty token.
    pub fn from_response_at(response: TokenResponse, issued_at: DateTime<Utc>) -> Result<Self> {
        let default_expiry = issued_at + Duration::seconds(DEFAULT_LIFETIME_SECS);
        let token = match response {
            TokenResponse::OAuth {
                access_token,
                token_type,
                expires_in,
                scope,
            } => Self {
                access_token,
                token_type: token_type.unwrap_or_else(|| "Bearer".to_string()),
                expires_at: expires_in
                    .map_or(default_expiry, |secs| issued_at + Duration::seconds(secs)),
                scope,
            },
            TokenResponse::Bearer { token, expires } => Self {
                expires_at: expires.unwrap_or(default_expiry),
                ..Self::new(token, default_expiry)
            },
            TokenResponse::LegacyBearer { token, expires } => Self {
                expires_at: Utc
                    .timestamp_millis_opt(expires)
                    .single()
                    .unwrap_or(default_expiry),
                ..Self::new(token, default_expiry)
            },
        };

        if token.access_token.trim().is_empty() {
            return Err(Error::InvalidResponse("empty access token".into()));
        }
        Ok(token)
    }

    /// Checks if the token is expired (with 60 second buffer).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Checks expiry against an explicit instant.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_BUFFER_SECS) >= self.expires_at
    }

    /// Returns true if the token is valid (not expired).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_expired()
    }

    /// Sets the scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Value for the `Authorization` header.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Token response shapes returned by the supported API generations.
///
/// Variants are tried in declaration order.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TokenResponse {
    /// RFC 6749 style (`access_token`, `expires_in`).
    OAuth {
        /// Access token.
        access_token: String,
        /// Token type.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_type: Option<String>,
        /// Expires in seconds.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expires_in: Option<i64>,
        /// Scope.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scope: Option<String>,
    },
    /// Modern bearer endpoint (`token`, RFC 3339 `expires`).
    Bearer {
        /// Bearer token.
        token: String,
        /// Absolute expiry.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expires: Option<DateTime<Utc>>,
    },
    /// Legacy bearer endpoint (`token`, epoch-millisecond `expires`).
    LegacyBearer {
        /// Bearer token.
        token: String,
        /// Expiry as milliseconds since the Unix epoch.
        expires: i64,
    },
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match self {
            Self::OAuth { .. } => "OAuth",
            Self::Bearer { .. } => "Bearer",
            Self::LegacyBearer { .. } => "LegacyBearer",
        };
        f.debug_struct("TokenResponse")
            .field("shape", &shape)
            .finish_non_exhaustive()
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
    fn test_token_expiration() {
        let expired = Token::new("access123", Utc::now() - Duration::seconds(120));
        assert!(expired.is_expired());
        assert!(!expired.is_valid());

        let valid = Token::new("access123", Utc::now() + Duration::seconds(3600));
        assert!(!valid.is_expired());
        assert!(valid.is_valid());
    }

    #[test]
    fn test_expiry_buffer() {
        let now = Utc::now();
        let token = Token::new("access123", now + Duration::seconds(30));
        assert!(token.is_expired_at(now));
    }

    #[test]
    fn test_oauth_shape() {
        let issued = Utc::now();
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"abc","token_type":"Bearer","expires_in":1199,"scope":"api-role:1"}"#,
        )
        .unwrap();
        let token = Token::from_response_at(response, issued).unwrap();
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.expires_at, issued + Duration::seconds(1199));
        assert_eq!(token.scope.as_deref(), Some("api-role:1"));
    }

    #[test]
    fn test_bearer_shape() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"token":"abc","expires":"2030-01-01T00:00:00.000Z"}"#)
                .unwrap();
        assert!(matches!(response, TokenResponse::Bearer { .. }));
        let token = Token::from_response(response).unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_at.to_rfc3339(), "2030-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_legacy_bearer_shape() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"token":"abc","expires":1893456000000}"#).unwrap();
        assert!(matches!(response, TokenResponse::LegacyBearer { .. }));
        let token = Token::from_response(response).unwrap();
        assert_eq!(token.expires_at.timestamp(), 1893456000);
    }

    #[test]
    fn test_missing_expiry_uses_default_lifetime() {
        let issued = Utc::now();
        let response: TokenResponse = serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        let token = Token::from_response_at(response, issued).unwrap();
        assert_eq!(
            token.expires_at,
            issued + Duration::seconds(DEFAULT_LIFETIME_SECS)
        );
    }

    #[test]
    fn test_empty_token_rejected() {
        let response: TokenResponse = serde_json::from_str(r#"{"token":"  "}"#).unwrap();
        assert!(matches!(
            Token::from_response(response),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let token = Token::new("super-secret", Utc::now());
        let debug = format!("{token:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
