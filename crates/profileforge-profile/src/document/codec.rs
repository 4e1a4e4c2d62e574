//! Property-list encoding of documents.
//!
//! Layout follows the configuration-profile convention: a top-level
//! dictionary of `Payload*` keys with the units under `PayloadContent`.
//! Each unit dictionary carries its own `Payload*` keys plus its settings
//! flattened alongside them.

use super::{Document, DocumentUnit, PrivacyUnit, Scope};
use crate::error::{Error, Result};
use crate::privacy::{
    AppleEventsReceiver, Authorization, CaptureScope, IdentifierKind, PrivacyAuthorization,
    PrivacyService,
};
use crate::unit::{ConfigUnit, PRIVACY_UNIT_TYPE, Platform};
use crate::value::SettingValue;
use plist::{Dictionary, Value};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::warn;
use uuid::Uuid;

const PAYLOAD_VERSION: i64 = 1;

/// On-disk / on-wire property-list flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// XML property list.
    #[default]
    Xml,
    /// Binary property list (`bplist00`).
    Binary,
}

impl Document {
    /// Converts the document to a property-list tree.
    #[must_use]
    pub fn to_plist(&self) -> Value {
        let mut root = Dictionary::new();
        root.insert("PayloadDisplayName".into(), self.name.clone().into());
        root.insert("PayloadDescription".into(), self.description.clone().into());
        root.insert("PayloadIdentifier".into(), self.identifier.clone().into());
        root.insert("PayloadOrganization".into(), self.organization.clone().into());
        root.insert("PayloadScope".into(), self.scope.as_str().into());
        root.insert("PayloadType".into(), "Configuration".into());
        root.insert("PayloadUUID".into(), uuid_value(self.instance_id));
        root.insert("PayloadVersion".into(), Value::Integer(PAYLOAD_VERSION.into()));
        root.insert(
            "TargetDeviceType".into(),
            Value::Integer(target_device_type(self.platform).into()),
        );
        root.insert(
            "PayloadContent".into(),
            Value::Array(
                self.units
                    .iter()
                    .map(|u| unit_to_plist(u, &self.identifier))
                    .collect(),
            ),
        );
        Value::Dictionary(root)
    }

    /// Serializes the document.
    ///
    /// # Errors
    ///
    /// Returns an error if the property-list writer fails.
    pub fn to_bytes(&self, encoding: Encoding) -> Result<Vec<u8>> {
        let value = self.to_plist();
        let mut out = Vec::new();
        match encoding {
            Encoding::Xml => value.to_writer_xml(&mut out)?,
            Encoding::Binary => value.to_writer_binary(&mut out)?,
        }
        Ok(out)
    }

    /// Parses a document from XML or binary property-list bytes.
    ///
    /// Settings outside the supported value space are dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a property list or required
    /// keys are missing.
    pub fn from_plist_bytes(bytes: &[u8]) -> Result<Self> {
        let value = Value::from_reader(Cursor::new(bytes))?;
        let root = value
            .as_dictionary()
            .ok_or_else(|| Error::Malformed("top level is not a dictionary".into()))?;

        let content = root
            .get("PayloadContent")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let units = content
            .iter()
            .map(unit_from_plist)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: string_key(root, "PayloadDisplayName").unwrap_or_default(),
            description: string_key(root, "PayloadDescription").unwrap_or_default(),
            identifier: required_string(root, "PayloadIdentifier")?,
            organization: string_key(root, "PayloadOrganization").unwrap_or_default(),
            scope: string_key(root, "PayloadScope")
                .and_then(|s| Scope::parse(&s))
                .unwrap_or_default(),
            platform: root
                .get("TargetDeviceType")
                .and_then(Value::as_signed_integer)
                .map_or(Platform::MacOs, platform_from_target),
            instance_id: uuid_key(root)?,
            units,
        })
    }
}

fn unit_to_plist(unit: &DocumentUnit, document_identifier: &str) -> Value {
    let mut dict = Dictionary::new();
    dict.insert("PayloadType".into(), unit.unit_type().into());
    dict.insert(
        "PayloadIdentifier".into(),
        unit.identifier(document_identifier).into(),
    );
    dict.insert("PayloadUUID".into(), uuid_value(unit.instance_id()));
    dict.insert("PayloadDisplayName".into(), unit.display_name().into());
    dict.insert("PayloadVersion".into(), Value::Integer(PAYLOAD_VERSION.into()));
    dict.insert("PayloadEnabled".into(), Value::Boolean(unit.enabled()));

    match unit {
        DocumentUnit::Settings(unit) => {
            dict.insert("PayloadDescription".into(), unit.description.clone().into());
            for (key, value) in &unit.settings {
                // Header keys are never overwritten by settings.
                if key.starts_with("Payload") {
                    warn!("Skipping reserved setting {key} in unit {}", unit.unit_type);
                    continue;
                }
                dict.insert(key.clone(), value.to_plist());
            }
        }
        DocumentUnit::Privacy(unit) => {
            dict.insert("PayloadDescription".into(), "".into());
            let mut services = Dictionary::new();
            for entry in &unit.entries {
                services.insert(
                    entry.service.key().to_string(),
                    Value::Array(vec![entry_to_plist(entry)]),
                );
            }
            dict.insert("Services".into(), Value::Dictionary(services));
        }
    }
    Value::Dictionary(dict)
}

fn entry_to_plist(entry: &PrivacyAuthorization) -> Value {
    let mut dict = Dictionary::new();
    dict.insert("Identifier".into(), entry.identifier.clone().into());
    dict.insert("IdentifierType".into(), entry.identifier_kind.as_str().into());
    if let Some(requirement) = &entry.code_requirement {
        dict.insert("CodeRequirement".into(), requirement.clone().into());
    }
    dict.insert("Authorization".into(), entry.authorization().as_str().into());
    dict.insert("StaticCode".into(), Value::Boolean(false));
    if let Some(comment) = &entry.comment {
        dict.insert("Comment".into(), comment.clone().into());
    }
    if let Some(receiver) = &entry.receiver {
        dict.insert("AEReceiverIdentifier".into(), receiver.identifier.clone().into());
        dict.insert(
            "AEReceiverIdentifierType".into(),
            receiver.identifier_kind.as_str().into(),
        );
        if let Some(requirement) = &receiver.code_requirement {
            dict.insert("AEReceiverCodeRequirement".into(), requirement.clone().into());
        }
    }
    if let Some(scope) = entry.capture_scope {
        dict.insert("CaptureScope".into(), scope.as_str().into());
    }
    Value::Dictionary(dict)
}

fn unit_from_plist(value: &Value) -> Result<DocumentUnit> {
    let dict = value
        .as_dictionary()
        .ok_or_else(|| Error::Malformed("unit is not a dictionary".into()))?;
    let unit_type = required_string(dict, "PayloadType")?;
    let instance_id = uuid_key(dict)?;
    let display_name = string_key(dict, "PayloadDisplayName").unwrap_or_default();

    if unit_type == PRIVACY_UNIT_TYPE {
        let services = dict
            .get("Services")
            .and_then(Value::as_dictionary)
            .ok_or_else(|| Error::Malformed("privacy unit has no Services".into()))?;
        let mut entries = Vec::with_capacity(services.len());
        for (key, value) in services {
            let list = value.as_array().map(Vec::as_slice).unwrap_or_default();
            if list.len() > 1 {
                warn!("Service {key} has {} entries; keeping the last", list.len());
            }
            if let Some(entry) = list.last() {
                entries.push(entry_from_plist(key, entry)?);
            }
        }
        return Ok(DocumentUnit::Privacy(PrivacyUnit {
            instance_id,
            display_name,
            entries,
        }));
    }

    let mut unit = ConfigUnit::new(unit_type, display_name)
        .with_instance_id(instance_id)
        .with_description(string_key(dict, "PayloadDescription").unwrap_or_default())
        .with_enabled(
            dict.get("PayloadEnabled")
                .and_then(Value::as_boolean)
                .unwrap_or(true),
        );
    for (key, value) in dict {
        if key.starts_with("Payload") {
            continue;
        }
        match SettingValue::from_plist(value) {
            Some(setting) => {
                unit.settings.insert(key.clone(), setting);
            }
            None => warn!(
                "Dropping unsupported setting {key} in unit {}",
                unit.unit_type
            ),
        }
    }
    Ok(DocumentUnit::Settings(unit))
}

fn entry_from_plist(service_key: &str, value: &Value) -> Result<PrivacyAuthorization> {
    let dict = value
        .as_dictionary()
        .ok_or_else(|| Error::Malformed(format!("{service_key} entry is not a dictionary")))?;
    let service: PrivacyService = service_key.to_string().into();
    let authorization = string_key(dict, "Authorization")
        .and_then(|s| Authorization::parse(&s))
        .or_else(|| {
            dict.get("Allowed")
                .and_then(Value::as_boolean)
                .map(|allowed| if allowed { Authorization::Allow } else { Authorization::Deny })
        })
        .ok_or_else(|| Error::Malformed(format!("{service_key} entry has no decision")))?;

    let receiver = string_key(dict, "AEReceiverIdentifier").map(|identifier| AppleEventsReceiver {
        identifier,
        identifier_kind: string_key(dict, "AEReceiverIdentifierType")
            .and_then(|s| IdentifierKind::parse(&s))
            .unwrap_or_default(),
        code_requirement: string_key(dict, "AEReceiverCodeRequirement"),
    });

    Ok(PrivacyAuthorization {
        service,
        identifier: string_key(dict, "Identifier").unwrap_or_default(),
        identifier_kind: string_key(dict, "IdentifierType")
            .and_then(|s| IdentifierKind::parse(&s))
            .unwrap_or_default(),
        code_requirement: string_key(dict, "CodeRequirement"),
        allowed: authorization != Authorization::Deny,
        user_override: authorization == Authorization::AllowStandardUserToSetSystemService,
        comment: string_key(dict, "Comment"),
        receiver,
        capture_scope: string_key(dict, "CaptureScope").and_then(|s| CaptureScope::parse(&s)),
    })
}

fn uuid_value(id: Uuid) -> Value {
    Value::String(id.hyphenated().to_string().to_uppercase())
}

fn uuid_key(dict: &Dictionary) -> Result<Uuid> {
    let raw = required_string(dict, "PayloadUUID")?;
    Uuid::parse_str(&raw).map_err(|e| Error::Malformed(format!("PayloadUUID '{raw}': {e}")))
}

fn string_key(dict: &Dictionary, key: &str) -> Option<String> {
    dict.get(key).and_then(Value::as_string).map(str::to_string)
}

fn required_string(dict: &Dictionary, key: &str) -> Result<String> {
    string_key(dict, key).ok_or_else(|| Error::Malformed(format!("missing {key}")))
}

const fn target_device_type(platform: Platform) -> i64 {
    match platform {
        Platform::MacOs => 5,
        Platform::Ios | Platform::IpadOs => 1,
        Platform::TvOs => 4,
    }
}

const fn platform_from_target(value: i64) -> Platform {
    match value {
        1 => Platform::Ios,
        4 => Platform::TvOs,
        _ => Platform::MacOs,
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

    fn sample() -> Document {
        let wifi = ConfigUnit::new("com.apple.wifi.managed", "Office Wi-Fi")
            .with_setting("SSID_STR", "acme-corp")
            .with_setting("AutoJoin", true)
            .with_setting("Priority", 10_i64);
        let privacy = PrivacyUnit {
            instance_id: Uuid::new_v4(),
            display_name: "Privacy".into(),
            entries: vec![
                PrivacyAuthorization::new(PrivacyService::Camera, "com.acme.meet", false)
                    .with_comment("no camera"),
                PrivacyAuthorization::new(PrivacyService::AppleEvents, "com.acme.agent", true)
                    .with_receiver(AppleEventsReceiver {
                        identifier: "com.apple.systemevents".into(),
                        identifier_kind: IdentifierKind::BundleId,
                        code_requirement: Some("identifier \"com.apple.systemevents\"".into()),
                    }),
            ],
        };
        Document {
            name: "Acme Baseline".into(),
            description: "Baseline settings".into(),
            identifier: "com.acme.baseline".into(),
            organization: "Acme".into(),
            scope: Scope::System,
            platform: Platform::MacOs,
            instance_id: Uuid::new_v4(),
            units: vec![DocumentUnit::Settings(wifi), DocumentUnit::Privacy(privacy)],
        }
    }

    #[test]
    fn test_top_level_keys() {
        let value = sample().to_plist();
        let root = value.as_dictionary().unwrap();
        assert_eq!(
            root.get("PayloadType").and_then(Value::as_string),
            Some("Configuration")
        );
        assert_eq!(
            root.get("PayloadScope").and_then(Value::as_string),
            Some("System")
        );
        let content = root.get("PayloadContent").and_then(Value::as_array).unwrap();
        assert_eq!(content.len(), 2);
    }

    #[test]
    fn test_unit_keys_preserve_order() {
        let value = sample().to_plist();
        let content = value
            .as_dictionary()
            .and_then(|d| d.get("PayloadContent"))
            .and_then(Value::as_array)
            .unwrap();
        let wifi = content[0].as_dictionary().unwrap();
        assert_eq!(
            wifi.get("SSID_STR").and_then(Value::as_string),
            Some("acme-corp")
        );
        assert_eq!(wifi.get("PayloadEnabled").and_then(Value::as_boolean), Some(true));
        let privacy = content[1].as_dictionary().unwrap();
        assert_eq!(
            privacy.get("PayloadType").and_then(Value::as_string),
            Some(PRIVACY_UNIT_TYPE)
        );
        let camera = privacy
            .get("Services")
            .and_then(Value::as_dictionary)
            .and_then(|s| s.get("Camera"))
            .and_then(Value::as_array)
            .and_then(|a| a.first())
            .and_then(Value::as_dictionary)
            .unwrap();
        assert_eq!(
            camera.get("Authorization").and_then(Value::as_string),
            Some("Deny")
        );
    }

    #[test]
    fn test_xml_and_binary_decode_to_same_document() {
        let document = sample();
        let xml = document.to_bytes(Encoding::Xml).unwrap();
        let binary = document.to_bytes(Encoding::Binary).unwrap();
        assert!(xml.starts_with(b"<?xml"));
        assert!(binary.starts_with(b"bplist00"));

        let from_xml = Document::from_plist_bytes(&xml).unwrap();
        let from_binary = Document::from_plist_bytes(&binary).unwrap();
        assert_eq!(from_xml, from_binary);
        assert_eq!(from_xml, document);
    }

    #[test]
    fn test_settings_never_overwrite_unit_header() {
        let mut document = sample();
        let DocumentUnit::Settings(wifi) = &mut document.units[0] else {
            unreachable!()
        };
        wifi.settings
            .insert("PayloadType".into(), SettingValue::String("com.acme.other".into()));

        let bytes = document.to_bytes(Encoding::Xml).unwrap();
        let decoded = Document::from_plist_bytes(&bytes).unwrap();
        assert_eq!(decoded.units[0].unit_type(), "com.apple.wifi.managed");
        assert_eq!(decoded, without_reserved_settings(document));
    }

    fn without_reserved_settings(mut document: Document) -> Document {
        for unit in &mut document.units {
            if let DocumentUnit::Settings(unit) = unit {
                unit.settings.retain(|key, _| !key.starts_with("Payload"));
            }
        }
        document
    }

    #[test]
    fn test_decode_rejects_missing_identifier() {
        let mut root = Dictionary::new();
        root.insert("PayloadUUID".into(), uuid_value(Uuid::new_v4()));
        let mut bytes = Vec::new();
        Value::Dictionary(root).to_writer_xml(&mut bytes).unwrap();
        assert!(matches!(
            Document::from_plist_bytes(&bytes),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_legacy_allowed_flag() {
        let mut entry = Dictionary::new();
        entry.insert("Identifier".into(), "com.acme.app".into());
        entry.insert("Allowed".into(), Value::Boolean(true));
        let decoded = entry_from_plist("Camera", &Value::Dictionary(entry)).unwrap();
        assert!(decoded.allowed);
        assert!(!decoded.user_override);
    }
}
