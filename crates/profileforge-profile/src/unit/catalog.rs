//! Known unit types.

use super::{PRIVACY_UNIT_TYPE, Platform, UnitCategory};
use crate::value::ValueKind;

/// Static description of a known unit type.
#[derive(Debug)]
pub struct UnitDefinition {
    /// Unit type identifier.
    pub unit_type: &'static str,
    /// Display name.
    pub display_name: &'static str,
    /// Category.
    pub category: UnitCategory,
    /// Platforms the type applies to.
    pub platforms: &'static [Platform],
    /// Settings that must be present, with their expected kind.
    pub required_settings: &'static [(&'static str, ValueKind)],
    /// Platforms on which the type is deprecated.
    pub deprecated_on: &'static [Platform],
    /// At most one unit of this type per document.
    pub unique: bool,
}

impl UnitDefinition {
    /// Returns `true` if the type is deprecated for the platform.
    #[must_use]
    pub fn is_deprecated_on(&self, platform: Platform) -> bool {
        self.deprecated_on.contains(&platform)
    }

    /// Returns `true` if the type applies to the platform.
    #[must_use]
    pub fn supports(&self, platform: Platform) -> bool {
        self.platforms.contains(&platform)
    }
}

const APPLE_MOBILE: &[Platform] = &[Platform::MacOs, Platform::Ios, Platform::IpadOs];
const MAC_ONLY: &[Platform] = &[Platform::MacOs];

static CATALOG: &[UnitDefinition] = &[
    UnitDefinition {
        unit_type: "com.apple.wifi.managed",
        display_name: "Wi-Fi",
        category: UnitCategory::Network,
        platforms: &Platform::ALL,
        required_settings: &[("SSID_STR", ValueKind::String)],
        deprecated_on: &[],
        unique: false,
    },
    UnitDefinition {
        unit_type: "com.apple.vpn.managed",
        display_name: "VPN",
        category: UnitCategory::Network,
        platforms: APPLE_MOBILE,
        required_settings: &[("VPNType", ValueKind::String)],
        deprecated_on: &[],
        unique: false,
    },
    UnitDefinition {
        unit_type: "com.apple.mobiledevice.passwordpolicy",
        display_name: "Passcode",
        category: UnitCategory::Security,
        platforms: APPLE_MOBILE,
        required_settings: &[],
        deprecated_on: &[],
        unique: true,
    },
    UnitDefinition {
        unit_type: "com.apple.security.firewall",
        display_name: "Firewall",
        category: UnitCategory::Security,
        platforms: MAC_ONLY,
        required_settings: &[("EnableFirewall", ValueKind::Bool)],
        deprecated_on: &[],
        unique: true,
    },
    UnitDefinition {
        unit_type: "com.apple.MCX.FileVault2",
        display_name: "FileVault",
        category: UnitCategory::Security,
        platforms: MAC_ONLY,
        required_settings: &[("Enable", ValueKind::String)],
        deprecated_on: &[],
        unique: true,
    },
    UnitDefinition {
        unit_type: "com.apple.applicationaccess",
        display_name: "Restrictions",
        category: UnitCategory::Restrictions,
        platforms: &Platform::ALL,
        required_settings: &[],
        deprecated_on: &[],
        unique: false,
    },
    UnitDefinition {
        unit_type: "com.apple.webcontent-filter",
        display_name: "Content Filter",
        category: UnitCategory::Restrictions,
        platforms: APPLE_MOBILE,
        required_settings: &[("FilterType", ValueKind::String)],
        deprecated_on: &[],
        unique: false,
    },
    UnitDefinition {
        unit_type: "com.apple.familycontrols.contentfilter",
        display_name: "Parental Content Filter",
        category: UnitCategory::Restrictions,
        platforms: MAC_ONLY,
        required_settings: &[],
        deprecated_on: MAC_ONLY,
        unique: true,
    },
    UnitDefinition {
        unit_type: "com.apple.mcxMenuExtras",
        display_name: "Menu Extras",
        category: UnitCategory::System,
        platforms: MAC_ONLY,
        required_settings: &[],
        deprecated_on: MAC_ONLY,
        unique: true,
    },
    UnitDefinition {
        unit_type: "com.apple.loginwindow",
        display_name: "Login Window",
        category: UnitCategory::System,
        platforms: MAC_ONLY,
        required_settings: &[],
        deprecated_on: &[],
        unique: true,
    },
    UnitDefinition {
        unit_type: "com.apple.screensaver",
        display_name: "Screen Saver",
        category: UnitCategory::System,
        platforms: MAC_ONLY,
        required_settings: &[],
        deprecated_on: &[],
        unique: true,
    },
    UnitDefinition {
        unit_type: PRIVACY_UNIT_TYPE,
        display_name: "Privacy Preferences Policy Control",
        category: UnitCategory::Privacy,
        platforms: MAC_ONLY,
        required_settings: &[],
        deprecated_on: &[],
        unique: true,
    },
];

/// Looks up a unit type in the catalog.
#[must_use]
pub fn lookup(unit_type: &str) -> Option<&'static UnitDefinition> {
    CATALOG.iter().find(|def| def.unit_type == unit_type)
}

/// Every known definition.
#[must_use]
pub fn definitions() -> &'static [UnitDefinition] {
    CATALOG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let def = lookup("com.apple.security.firewall");
        assert!(def.is_some_and(|d| d.unique && d.supports(Platform::MacOs)));
        assert!(lookup("com.example.unknown").is_none());
    }

    #[test]
    fn test_deprecations() {
        let def = lookup("com.apple.mcxMenuExtras");
        assert!(def.is_some_and(|d| d.is_deprecated_on(Platform::MacOs)));
    }

    #[test]
    fn test_catalog_types_are_unique() {
        let mut types: Vec<&str> = definitions().iter().map(|d| d.unit_type).collect();
        types.sort_unstable();
        types.dedup();
        assert_eq!(types.len(), definitions().len());
    }
}
