//! Immutable document snapshots.

mod codec;

use crate::privacy::{PrivacyAuthorization, PrivacyService};
use crate::unit::{ConfigUnit, PRIVACY_UNIT_TYPE, Platform};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub use codec::Encoding;

/// Where the profile is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Scope {
    /// Device-wide.
    #[default]
    System,
    /// Per user.
    User,
}

impl Scope {
    /// Interchange value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "System",
            Self::User => "User",
        }
    }

    /// Parses an interchange value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "System" => Some(Self::System),
            "User" => Some(Self::User),
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The privacy-authorization unit of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivacyUnit {
    /// Instance id.
    pub instance_id: Uuid,
    /// Display name.
    pub display_name: String,
    /// Entries, at most one per service.
    pub entries: Vec<PrivacyAuthorization>,
}

impl PrivacyUnit {
    /// Returns the entry for a service.
    #[must_use]
    pub fn entry(&self, service: &PrivacyService) -> Option<&PrivacyAuthorization> {
        self.entries.iter().find(|e| e.service.key() == service.key())
    }
}

/// One unit inside a document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentUnit {
    /// Settings-map unit.
    Settings(ConfigUnit),
    /// Privacy-authorization unit.
    Privacy(PrivacyUnit),
}

impl DocumentUnit {
    /// Unit type identifier.
    #[must_use]
    pub fn unit_type(&self) -> &str {
        match self {
            Self::Settings(unit) => &unit.unit_type,
            Self::Privacy(_) => PRIVACY_UNIT_TYPE,
        }
    }

    /// Instance id.
    #[must_use]
    pub const fn instance_id(&self) -> Uuid {
        match self {
            Self::Settings(unit) => unit.instance_id,
            Self::Privacy(unit) => unit.instance_id,
        }
    }

    /// Display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::Settings(unit) => &unit.display_name,
            Self::Privacy(unit) => &unit.display_name,
        }
    }

    /// Whether the unit is enabled. Privacy units are always enabled.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        match self {
            Self::Settings(unit) => unit.enabled,
            Self::Privacy(_) => true,
        }
    }

    /// Identifier written to the interchange format.
    #[must_use]
    pub fn identifier(&self, document_identifier: &str) -> String {
        format!(
            "{document_identifier}.{}.{}",
            self.unit_type(),
            self.instance_id().hyphenated()
        )
    }
}

/// A fully composed configuration profile.
///
/// Built fresh by [`crate::ProfileComposer::build`]; never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Profile name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Reverse-DNS identifier.
    pub identifier: String,
    /// Organization.
    pub organization: String,
    /// Install scope.
    pub scope: Scope,
    /// Declared target platform.
    pub platform: Platform,
    /// Instance id of the profile itself.
    pub instance_id: Uuid,
    /// Units in order.
    pub units: Vec<DocumentUnit>,
}

impl Document {
    /// The privacy unit, if any.
    #[must_use]
    pub fn privacy_unit(&self) -> Option<&PrivacyUnit> {
        self.units.iter().find_map(|u| match u {
            DocumentUnit::Privacy(p) => Some(p),
            DocumentUnit::Settings(_) => None,
        })
    }

    /// Settings units in order.
    pub fn settings_units(&self) -> impl Iterator<Item = &ConfigUnit> {
        self.units.iter().filter_map(|u| match u {
            DocumentUnit::Settings(unit) => Some(unit),
            DocumentUnit::Privacy(_) => None,
        })
    }

    /// Finds a unit by instance id.
    #[must_use]
    pub fn unit(&self, instance_id: Uuid) -> Option<&DocumentUnit> {
        self.units.iter().find(|u| u.instance_id() == instance_id)
    }

    /// Export filename derived from the profile name.
    ///
    /// Characters outside `[A-Za-z0-9 ._-]` become `_`; an empty result
    /// falls back to `profile`.
    #[must_use]
    pub fn file_name(&self) -> String {
        let sanitized: String = self
            .name
            .trim()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let stem = sanitized.trim_matches(|c: char| c == '.' || c.is_whitespace());
        let stem = if stem.is_empty() { "profile" } else { stem };
        format!("{stem}.mobileconfig")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn document(name: &str) -> Document {
        Document {
            name: name.to_string(),
            description: String::new(),
            identifier: "com.acme.profile".to_string(),
            organization: "Acme".to_string(),
            scope: Scope::System,
            platform: Platform::MacOs,
            instance_id: Uuid::new_v4(),
            units: Vec::new(),
        }
    }

    #[test]
    fn test_file_name() {
        assert_eq!(document("Acme Baseline").file_name(), "Acme Baseline.mobileconfig");
        assert_eq!(document("a/b:c").file_name(), "a_b_c.mobileconfig");
        assert_eq!(document("  ").file_name(), "profile.mobileconfig");
        assert_eq!(document("..").file_name(), "profile.mobileconfig");
    }

    #[test]
    fn test_unit_identifier() {
        let unit = ConfigUnit::new("com.apple.wifi.managed", "Wi-Fi");
        let id = unit.instance_id;
        let unit = DocumentUnit::Settings(unit);
        assert_eq!(
            unit.identifier("com.acme.profile"),
            format!("com.acme.profile.com.apple.wifi.managed.{id}")
        );
    }

    #[test]
    fn test_scope_strings() {
        assert_eq!(Scope::parse(Scope::User.as_str()), Some(Scope::User));
        assert_eq!(Scope::parse("Device"), None);
    }
}
