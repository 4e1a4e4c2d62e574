//! Exchange credentials.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Credential exchange mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeMode {
    /// API client id + client secret (`grant_type=client_credentials`).
    ClientCredentials,
    /// Username + password over HTTP basic auth.
    Basic,
}

impl fmt::Display for ExchangeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientCredentials => write!(f, "client credentials"),
            Self::Basic => write!(f, "basic"),
        }
    }
}

/// Secret material exchanged for a bearer token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExchangeCredentials {
    /// API client credentials.
    ClientCredentials {
        /// Client id.
        client_id: String,
        /// Client secret.
        client_secret: String,
    },
    /// Username and password.
    Basic {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
}

impl ExchangeCredentials {
    /// Creates client-credential material.
    #[must_use]
    pub fn client_credentials(client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self::ClientCredentials {
            client_id: client_id.into(),
            client_secret: secret.into(),
        }
    }

    /// Creates basic-auth material.
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the exchange mode.
    #[must_use]
    pub const fn mode(&self) -> ExchangeMode {
        match self {
            Self::ClientCredentials { .. } => ExchangeMode::ClientCredentials,
            Self::Basic { .. } => ExchangeMode::Basic,
        }
    }

    /// Returns the non-secret principal (client id or username).
    #[must_use]
    pub fn principal(&self) -> &str {
        match self {
            Self::ClientCredentials { client_id, .. } => client_id,
            Self::Basic { username, .. } => username,
        }
    }

    /// Returns `true` if either half of the pair is blank.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        let (principal, secret) = match self {
            Self::ClientCredentials {
                client_id,
                client_secret,
            } => (client_id, client_secret),
            Self::Basic { username, password } => (username, password),
        };
        principal.trim().is_empty() || secret.is_empty()
    }
}

impl fmt::Debug for ExchangeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeCredentials")
            .field("mode", &self.mode())
            .field("principal", &self.principal())
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_and_principal() {
        let cc = ExchangeCredentials::client_credentials("x", "y");
        assert_eq!(cc.mode(), ExchangeMode::ClientCredentials);
        assert_eq!(cc.principal(), "x");

        let basic = ExchangeCredentials::basic("admin", "hunter2");
        assert_eq!(basic.mode(), ExchangeMode::Basic);
        assert_eq!(basic.principal(), "admin");
    }

    #[test]
    fn test_incomplete() {
        assert!(ExchangeCredentials::basic("", "pw").is_incomplete());
        assert!(ExchangeCredentials::client_credentials("id", "").is_incomplete());
        assert!(!ExchangeCredentials::client_credentials("id", "s").is_incomplete());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", ExchangeCredentials::basic("admin", "hunter2"));
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_serde_tagging() {
        let json =
            serde_json::to_string(&ExchangeCredentials::client_credentials("x", "y")).unwrap();
        assert!(json.contains(r#""mode":"client_credentials""#));
        let back: ExchangeCredentials = serde_json::from_str(&json).unwrap();
        assert_eq!(back.principal(), "x");
    }
}
