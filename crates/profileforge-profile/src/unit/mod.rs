//! Configuration units ("payloads").

pub mod catalog;

use crate::value::SettingValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

pub use catalog::{UnitDefinition, lookup};

/// Unit type of the privacy-authorization unit.
pub const PRIVACY_UNIT_TYPE: &str = "com.apple.TCC.configuration-profile-policy";

/// Target device platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Platform {
    /// macOS.
    #[default]
    #[serde(rename = "macOS")]
    MacOs,
    /// iOS.
    #[serde(rename = "iOS")]
    Ios,
    /// iPadOS.
    #[serde(rename = "iPadOS")]
    IpadOs,
    /// tvOS.
    #[serde(rename = "tvOS")]
    TvOs,
}

impl Platform {
    /// Every platform.
    pub const ALL: [Self; 4] = [Self::MacOs, Self::Ios, Self::IpadOs, Self::TvOs];

    /// Display name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::MacOs => "macOS",
            Self::Ios => "iOS",
            Self::IpadOs => "iPadOS",
            Self::TvOs => "tvOS",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Unit category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitCategory {
    /// Wi-Fi, VPN, proxies.
    Network,
    /// Passcodes, encryption, firewall.
    Security,
    /// Privacy preferences and authorizations.
    Privacy,
    /// Restrictions and content filters.
    Restrictions,
    /// Login window, screensaver and other system settings.
    System,
    /// Anything else.
    #[default]
    Custom,
}

/// One configuration unit.
///
/// Composition identity is [`ConfigUnit::instance_id`]; two units with the
/// same type are distinct as long as their instance ids differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigUnit {
    /// Unit type identifier (e.g. `com.apple.wifi.managed`).
    pub unit_type: String,
    /// Display name.
    pub display_name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Platforms this unit targets.
    #[serde(default)]
    pub platforms: Vec<Platform>,
    /// Category.
    #[serde(default)]
    pub category: UnitCategory,
    /// Settings, ordered by key.
    #[serde(default)]
    pub settings: BTreeMap<String, SettingValue>,
    /// Whether the unit is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Stable instance id.
    #[serde(default = "Uuid::new_v4")]
    pub instance_id: Uuid,
}

const fn default_enabled() -> bool {
    true
}

impl ConfigUnit {
    /// Creates a unit with a fresh instance id.
    ///
    /// Category and platforms are filled in from the catalog when the type
    /// is known.
    #[must_use]
    pub fn new(unit_type: impl Into<String>, display_name: impl Into<String>) -> Self {
        let unit_type = unit_type.into();
        let (category, platforms) = lookup(&unit_type).map_or_else(
            || (UnitCategory::Custom, Vec::new()),
            |def| (def.category, def.platforms.to_vec()),
        );
        Self {
            unit_type,
            display_name: display_name.into(),
            description: String::new(),
            platforms,
            category,
            settings: BTreeMap::new(),
            enabled: true,
            instance_id: Uuid::new_v4(),
        }
    }

    /// Sets a setting.
    #[must_use]
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the target platforms.
    #[must_use]
    pub fn with_platforms(mut self, platforms: Vec<Platform>) -> Self {
        self.platforms = platforms;
        self
    }

    /// Sets the enabled flag.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the instance id.
    #[must_use]
    pub const fn with_instance_id(mut self, instance_id: Uuid) -> Self {
        self.instance_id = instance_id;
        self
    }

    /// Returns the catalog definition for this unit's type.
    #[must_use]
    pub fn definition(&self) -> Option<&'static UnitDefinition> {
        lookup(&self.unit_type)
    }

    /// Returns a setting by key.
    #[must_use]
    pub fn setting(&self, key: &str) -> Option<&SettingValue> {
        self.settings.get(key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_known_type_uses_catalog() {
        let unit = ConfigUnit::new("com.apple.wifi.managed", "Office Wi-Fi");
        assert_eq!(unit.category, UnitCategory::Network);
        assert!(unit.platforms.contains(&Platform::MacOs));
        assert!(unit.enabled);
    }

    #[test]
    fn test_new_unknown_type() {
        let unit = ConfigUnit::new("com.example.custom", "Custom");
        assert_eq!(unit.category, UnitCategory::Custom);
        assert!(unit.platforms.is_empty());
    }

    #[test]
    fn test_instance_ids_are_unique() {
        let a = ConfigUnit::new("com.apple.wifi.managed", "A");
        let b = ConfigUnit::new("com.apple.wifi.managed", "A");
        assert_ne!(a.instance_id, b.instance_id);
    }

    #[test]
    fn test_deserialize_defaults() {
        let unit: ConfigUnit = serde_json::from_str(
            r#"{"unit_type":"com.apple.security.firewall","display_name":"Firewall","settings":{"EnableFirewall":true}}"#,
        )
        .unwrap();
        assert!(unit.enabled);
        assert_eq!(unit.setting("EnableFirewall"), Some(&SettingValue::Bool(true)));
    }

    #[test]
    fn test_platform_serde_names() {
        assert_eq!(serde_json::to_string(&Platform::MacOs).unwrap(), r#""macOS""#);
        let p: Platform = serde_json::from_str(r#""iPadOS""#).unwrap();
        assert_eq!(p, Platform::IpadOs);
    }
}
