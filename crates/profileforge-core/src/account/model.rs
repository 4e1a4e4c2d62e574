//! Account model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub i64);

impl AccountId {
    /// Create a new account ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Device-management platform vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    /// Jamf Pro.
    #[default]
    Jamf,
    /// Kandji.
    Kandji,
    /// Mosyle.
    Mosyle,
    /// Any other platform speaking a compatible API.
    Custom,
}

impl Vendor {
    /// Get display name for the vendor.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Jamf => "Jamf Pro",
            Self::Kandji => "Kandji",
            Self::Mosyle => "Mosyle",
            Self::Custom => "Custom",
        }
    }

    /// Value stored in the database.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Jamf => "jamf",
            Self::Kandji => "kandji",
            Self::Mosyle => "mosyle",
            Self::Custom => "custom",
        }
    }

    /// Parses a stored value, falling back to [`Vendor::Custom`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "jamf" => Self::Jamf,
            "kandji" => Self::Kandji,
            "mosyle" => Self::Mosyle,
            _ => Self::Custom,
        }
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A device-management server account.
///
/// Holds only non-secret metadata. Tokens and exchange credentials live in
/// the secret backend, keyed by [`Account::id`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier (None for unsaved accounts).
    pub id: Option<AccountId>,
    /// Display name for the account.
    pub name: String,
    /// Platform vendor.
    pub vendor: Vendor,
    /// Server base address.
    pub server_url: String,
    /// Last successful authentication.
    pub last_used_at: Option<DateTime<Utc>>,
    /// Whether this is the default account.
    pub is_default: bool,
}

impl Account {
    /// Create an unsaved account.
    #[must_use]
    pub fn new(name: impl Into<String>, vendor: Vendor, server_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vendor,
            server_url: server_url.into(),
            ..Self::default()
        }
    }

    /// Marks the account as default.
    #[must_use]
    pub const fn as_default(mut self) -> Self {
        self.is_default = true;
        self
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

    mod account_id_tests {
        use super::*;

        #[test]
        fn display() {
            let id = AccountId::new(123);
            assert_eq!(format!("{id}"), "123");
        }

        #[test]
        fn equality() {
            assert_eq!(AccountId::new(1), AccountId::new(1));
            assert_ne!(AccountId::new(1), AccountId::new(2));
        }
    }

    mod vendor_tests {
        use super::*;

        #[test]
        fn default_is_jamf() {
            assert_eq!(Vendor::default(), Vendor::Jamf);
        }

        #[test]
        fn stored_values_round_trip() {
            for vendor in [Vendor::Jamf, Vendor::Kandji, Vendor::Mosyle, Vendor::Custom] {
                assert_eq!(Vendor::parse(vendor.as_str()), vendor);
            }
        }

        #[test]
        fn unknown_is_custom() {
            assert_eq!(Vendor::parse("airwatch"), Vendor::Custom);
            assert_eq!(Vendor::parse("JAMF"), Vendor::Jamf);
        }
    }

    mod account_tests {
        use super::*;

        #[test]
        fn new_is_unsaved() {
            let account = Account::new("Acme", Vendor::Jamf, "https://acme.example.com");
            assert!(account.id.is_none());
            assert!(account.last_used_at.is_none());
            assert!(!account.is_default);
            assert!(account.as_default().is_default);
        }
    }
}
