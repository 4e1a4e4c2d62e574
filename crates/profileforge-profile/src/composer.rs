//! Profile composition.

use crate::document::{Document, DocumentUnit, PrivacyUnit, Scope};
use crate::error::Result;
use crate::privacy::{PrivacyAuthorization, PrivacyService};
use crate::unit::{ConfigUnit, Platform};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

const PRIVACY_DISPLAY_NAME: &str = "Privacy Preferences Policy Control";

/// A prescribed set of units and privacy authorizations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileTemplate {
    /// Template name.
    pub name: String,
    /// Template description.
    #[serde(default)]
    pub description: String,
    /// Units in order.
    #[serde(default)]
    pub units: Vec<ConfigUnit>,
    /// Privacy authorizations.
    #[serde(default)]
    pub privacy: Vec<PrivacyAuthorization>,
}

impl ProfileTemplate {
    /// Creates an empty template.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            units: Vec::new(),
            privacy: Vec::new(),
        }
    }

    /// Adds a unit.
    #[must_use]
    pub fn with_unit(mut self, unit: ConfigUnit) -> Self {
        self.units.push(unit);
        self
    }

    /// Adds a privacy authorization.
    #[must_use]
    pub fn with_privacy(mut self, entry: PrivacyAuthorization) -> Self {
        self.privacy.push(entry);
        self
    }

    /// Parses a template from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a template.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a template from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}

/// Mutable, single-writer holder of a profile under construction.
///
/// Call [`ProfileComposer::build`] before every export or submission; the
/// returned [`Document`] is a point-in-time copy.
#[derive(Debug, Clone)]
pub struct ProfileComposer {
    name: String,
    description: String,
    identifier: String,
    organization: String,
    scope: Scope,
    platform: Platform,
    instance_id: Uuid,
    units: Vec<ConfigUnit>,
    privacy: Vec<PrivacyAuthorization>,
    privacy_instance_id: Uuid,
}

impl ProfileComposer {
    /// Creates an empty composer.
    #[must_use]
    pub fn new(name: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            identifier: identifier.into(),
            organization: String::new(),
            scope: Scope::System,
            platform: Platform::MacOs,
            instance_id: Uuid::new_v4(),
            units: Vec::new(),
            privacy: Vec::new(),
            privacy_instance_id: Uuid::new_v4(),
        }
    }

    /// Recreates a composer from a decoded document.
    #[must_use]
    pub fn from_document(document: &Document) -> Self {
        let mut composer = Self::new(document.name.clone(), document.identifier.clone())
            .with_description(document.description.clone())
            .with_organization(document.organization.clone())
            .with_scope(document.scope)
            .with_platform(document.platform);
        composer.instance_id = document.instance_id;
        for unit in &document.units {
            match unit {
                DocumentUnit::Settings(unit) => composer.add_unit(unit.clone()),
                DocumentUnit::Privacy(privacy) => {
                    composer.privacy_instance_id = privacy.instance_id;
                    for entry in &privacy.entries {
                        composer.set_privacy_authorization(entry.clone());
                    }
                }
            }
        }
        composer
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the organization.
    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = organization.into();
        self
    }

    /// Sets the install scope.
    #[must_use]
    pub const fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Sets the declared platform.
    #[must_use]
    pub const fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Profile name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the profile.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Units in order.
    #[must_use]
    pub fn units(&self) -> &[ConfigUnit] {
        &self.units
    }

    /// Privacy authorizations in insertion order.
    #[must_use]
    pub fn privacy_authorizations(&self) -> &[PrivacyAuthorization] {
        &self.privacy
    }

    /// Adds a unit. Adding a unit whose instance id is already present
    /// replaces it in place.
    pub fn add_unit(&mut self, unit: ConfigUnit) {
        if let Some(existing) = self
            .units
            .iter_mut()
            .find(|u| u.instance_id == unit.instance_id)
        {
            debug!("Replacing unit {} in place", unit.instance_id);
            *existing = unit;
        } else {
            self.units.push(unit);
        }
    }

    /// Removes a unit by instance id.
    pub fn remove_unit(&mut self, instance_id: Uuid) -> Option<ConfigUnit> {
        let index = self.units.iter().position(|u| u.instance_id == instance_id)?;
        Some(self.units.remove(index))
    }

    /// Replaces every unit and every privacy authorization with the template's.
    ///
    /// Nothing from the previous state survives.
    pub fn apply_template(&mut self, template: &ProfileTemplate) {
        debug!(
            "Applying template '{}' ({} units, {} privacy entries)",
            template.name,
            template.units.len(),
            template.privacy.len()
        );
        self.units.clear();
        self.privacy.clear();
        self.privacy_instance_id = Uuid::new_v4();
        for unit in &template.units {
            self.add_unit(unit.clone());
        }
        for entry in &template.privacy {
            self.set_privacy_authorization(entry.clone());
        }
    }

    /// Inserts or replaces the entry for the entry's service.
    ///
    /// Services are matched by [`PrivacyService::key`], so a custom service
    /// spelled like a known one replaces it. Returns the replaced entry, if
    /// any.
    pub fn set_privacy_authorization(
        &mut self,
        entry: PrivacyAuthorization,
    ) -> Option<PrivacyAuthorization> {
        match self.privacy.iter_mut().find(|e| e.service.key() == entry.service.key()) {
            Some(existing) => Some(std::mem::replace(existing, entry)),
            None => {
                self.privacy.push(entry);
                None
            }
        }
    }

    /// Removes the entry for a service.
    pub fn remove_privacy_authorization(
        &mut self,
        service: &PrivacyService,
    ) -> Option<PrivacyAuthorization> {
        let index = self.privacy.iter().position(|e| e.service.key() == service.key())?;
        Some(self.privacy.remove(index))
    }

    /// Builds a fresh document snapshot.
    ///
    /// The privacy unit, when there are entries, follows the settings units.
    #[must_use]
    pub fn build(&self) -> Document {
        let mut units: Vec<DocumentUnit> = self
            .units
            .iter()
            .cloned()
            .map(DocumentUnit::Settings)
            .collect();
        if !self.privacy.is_empty() {
            units.push(DocumentUnit::Privacy(PrivacyUnit {
                instance_id: self.privacy_instance_id,
                display_name: PRIVACY_DISPLAY_NAME.to_string(),
                entries: self.privacy.clone(),
            }));
        }
        Document {
            name: self.name.clone(),
            description: self.description.clone(),
            identifier: self.identifier.clone(),
            organization: self.organization.clone(),
            scope: self.scope,
            platform: self.platform,
            instance_id: self.instance_id,
            units,
        }
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
    use crate::document::Encoding;
    use proptest::prelude::*;

    fn composer() -> ProfileComposer {
        ProfileComposer::new("Acme Baseline", "com.acme.baseline").with_organization("Acme")
    }

    fn camera(allowed: bool) -> PrivacyAuthorization {
        PrivacyAuthorization::new(PrivacyService::Camera, "com.acme.meet", allowed)
    }

    #[test]
    fn test_add_unit_is_idempotent_on_instance_id() {
        let mut c = composer();
        let unit = ConfigUnit::new("com.apple.wifi.managed", "Wi-Fi").with_setting("SSID_STR", "a");
        c.add_unit(unit.clone());
        c.add_unit(unit.clone());
        assert_eq!(c.units().len(), 1);

        let edited = unit.with_setting("SSID_STR", "b");
        c.add_unit(edited.clone());
        assert_eq!(c.units(), &[edited]);
    }

    #[test]
    fn test_remove_unit() {
        let mut c = composer();
        let unit = ConfigUnit::new("com.apple.wifi.managed", "Wi-Fi");
        let id = unit.instance_id;
        c.add_unit(unit);
        assert!(c.remove_unit(id).is_some());
        assert!(c.remove_unit(id).is_none());
        assert!(c.units().is_empty());
    }

    #[test]
    fn test_privacy_latest_wins() {
        let mut c = composer();
        assert!(c.set_privacy_authorization(camera(false)).is_none());
        let replaced = c.set_privacy_authorization(camera(true));
        assert_eq!(replaced, Some(camera(false)));

        let document = c.build();
        let privacy = document.privacy_unit().unwrap();
        assert_eq!(privacy.entries.len(), 1);
        assert!(privacy.entry(&PrivacyService::Camera).unwrap().allowed);
    }

    #[test]
    fn test_custom_service_spelled_like_known_one_replaces_it() {
        let mut c = composer();
        c.set_privacy_authorization(camera(false));
        let mut custom = camera(true);
        custom.service = PrivacyService::Custom("Camera".into());
        assert_eq!(c.set_privacy_authorization(custom), Some(camera(false)));

        let document = c.build();
        let privacy = document.privacy_unit().unwrap();
        assert_eq!(privacy.entries.len(), 1);
        assert!(privacy.entry(&PrivacyService::Camera).unwrap().allowed);

        let built = PrivacyAuthorization::new(
            PrivacyService::Custom("Microphone".into()),
            "com.acme.meet",
            false,
        );
        assert_eq!(built.service, PrivacyService::Microphone);
    }

    #[test]
    fn test_apply_template_replaces_everything() {
        let mut c = composer();
        c.add_unit(ConfigUnit::new("com.apple.loginwindow", "Old"));
        c.set_privacy_authorization(camera(false));
        c.set_privacy_authorization(PrivacyAuthorization::new(
            PrivacyService::Microphone,
            "com.acme.meet",
            false,
        ));

        let firewall =
            ConfigUnit::new("com.apple.security.firewall", "Firewall").with_setting("EnableFirewall", true);
        let template = ProfileTemplate::new("Security")
            .with_unit(firewall.clone())
            .with_privacy(PrivacyAuthorization::new(
                PrivacyService::SystemPolicyAllFiles,
                "com.acme.backup",
                true,
            ));
        c.apply_template(&template);

        let document = c.build();
        let settings: Vec<&ConfigUnit> = document.settings_units().collect();
        assert_eq!(settings, vec![&firewall]);
        let privacy = document.privacy_unit().unwrap();
        assert_eq!(privacy.entries, template.privacy);
    }

    #[test]
    fn test_apply_empty_template_leaves_no_units() {
        let mut c = composer();
        c.add_unit(ConfigUnit::new("com.apple.loginwindow", "Old"));
        c.set_privacy_authorization(camera(true));
        c.apply_template(&ProfileTemplate::new("Empty"));
        assert!(c.build().units.is_empty());
    }

    #[test]
    fn test_build_is_a_snapshot() {
        let mut c = composer();
        let before = c.build();
        c.add_unit(ConfigUnit::new("com.apple.loginwindow", "Login"));
        assert!(before.units.is_empty());
        assert_eq!(c.build().units.len(), 1);
    }

    #[test]
    fn test_from_document_preserves_identity() {
        let mut c = composer();
        c.add_unit(ConfigUnit::new("com.apple.loginwindow", "Login"));
        c.set_privacy_authorization(camera(true));
        let document = c.build();

        let bytes = document.to_bytes(Encoding::Xml).unwrap();
        let decoded = Document::from_plist_bytes(&bytes).unwrap();
        let rebuilt = ProfileComposer::from_document(&decoded).build();
        assert_eq!(rebuilt, document);
    }

    #[test]
    fn test_template_from_json() {
        let template = ProfileTemplate::from_json(
            r#"{
                "name": "Conferencing",
                "units": [{"unit_type":"com.apple.wifi.managed","display_name":"Wi-Fi","settings":{"SSID_STR":"acme"}}],
                "privacy": [{"service":"Camera","identifier":"us.zoom.xos","allowed":true}]
            }"#,
        )
        .unwrap();
        assert_eq!(template.units.len(), 1);
        assert_eq!(template.privacy[0].service, PrivacyService::Camera);
    }

    fn service_strategy() -> impl Strategy<Value = PrivacyService> {
        prop_oneof![
            Just(PrivacyService::Camera),
            Just(PrivacyService::Microphone),
            Just(PrivacyService::ScreenCapture),
            Just(PrivacyService::AppleEvents),
            "[A-Z][a-zA-Z]{2,8}".prop_map(|s| s.parse::<PrivacyService>().unwrap()),
        ]
    }

    proptest! {
        #[test]
        fn prop_one_entry_per_service_latest_wins(
            writes in prop::collection::vec((service_strategy(), "[a-z]{1,8}", any::<bool>()), 1..30)
        ) {
            let mut c = composer();
            for (service, ident, allowed) in &writes {
                c.set_privacy_authorization(PrivacyAuthorization::new(
                    service.clone(),
                    format!("com.acme.{ident}"),
                    *allowed,
                ));
            }

            let entries = c.privacy_authorizations();
            let mut services: Vec<&PrivacyService> = entries.iter().map(|e| &e.service).collect();
            services.sort();
            services.dedup();
            prop_assert_eq!(services.len(), entries.len());

            for entry in entries {
                let last = writes.iter().rev().find(|(s, _, _)| s == &entry.service).unwrap();
                prop_assert_eq!(&entry.identifier, &format!("com.acme.{}", last.1));
                prop_assert_eq!(entry.allowed, last.2);
            }
        }
    }
}
