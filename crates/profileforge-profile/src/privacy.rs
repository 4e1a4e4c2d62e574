//! Privacy authorizations (per-application, per-service allow/deny rules).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A privacy-protected system service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PrivacyService {
    /// Accessibility control.
    Accessibility,
    /// Contacts.
    AddressBook,
    /// Sending Apple Events to another application.
    AppleEvents,
    /// Calendars.
    Calendar,
    /// Camera.
    Camera,
    /// Input monitoring.
    ListenEvent,
    /// Microphone.
    Microphone,
    /// Photos library.
    Photos,
    /// Synthetic input events.
    PostEvent,
    /// Screen and audio recording.
    ScreenCapture,
    /// Full disk access.
    SystemPolicyAllFiles,
    /// Desktop folder.
    SystemPolicyDesktopFolder,
    /// Documents folder.
    SystemPolicyDocumentsFolder,
    /// Downloads folder.
    SystemPolicyDownloadsFolder,
    /// Any other service key.
    Custom(String),
}

impl PrivacyService {
    /// The service key used in the interchange format.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Accessibility => "Accessibility",
            Self::AddressBook => "AddressBook",
            Self::AppleEvents => "AppleEvents",
            Self::Calendar => "Calendar",
            Self::Camera => "Camera",
            Self::ListenEvent => "ListenEvent",
            Self::Microphone => "Microphone",
            Self::Photos => "Photos",
            Self::PostEvent => "PostEvent",
            Self::ScreenCapture => "ScreenCapture",
            Self::SystemPolicyAllFiles => "SystemPolicyAllFiles",
            Self::SystemPolicyDesktopFolder => "SystemPolicyDesktopFolder",
            Self::SystemPolicyDocumentsFolder => "SystemPolicyDocumentsFolder",
            Self::SystemPolicyDownloadsFolder => "SystemPolicyDownloadsFolder",
            Self::Custom(key) => key,
        }
    }

    /// Services that may only be denied or delegated to the user, never silently allowed.
    #[must_use]
    pub const fn requires_user_consent(&self) -> bool {
        matches!(self, Self::ScreenCapture | Self::ListenEvent)
    }

    /// Maps a custom service whose key names a known service onto that service.
    #[must_use]
    pub fn normalized(self) -> Self {
        match self {
            Self::Custom(key) => Self::from_key(&key),
            known => known,
        }
    }

    fn from_key(key: &str) -> Self {
        match key {
            "Accessibility" => Self::Accessibility,
            "AddressBook" => Self::AddressBook,
            "AppleEvents" => Self::AppleEvents,
            "Calendar" => Self::Calendar,
            "Camera" => Self::Camera,
            "ListenEvent" => Self::ListenEvent,
            "Microphone" => Self::Microphone,
            "Photos" => Self::Photos,
            "PostEvent" => Self::PostEvent,
            "ScreenCapture" => Self::ScreenCapture,
            "SystemPolicyAllFiles" => Self::SystemPolicyAllFiles,
            "SystemPolicyDesktopFolder" => Self::SystemPolicyDesktopFolder,
            "SystemPolicyDocumentsFolder" => Self::SystemPolicyDocumentsFolder,
            "SystemPolicyDownloadsFolder" => Self::SystemPolicyDownloadsFolder,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Services for which the platform only honours a deny rule.
    #[must_use]
    pub const fn deny_only(&self) -> bool {
        matches!(self, Self::Camera | Self::Microphone)
    }
}

impl FromStr for PrivacyService {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_key(s))
    }
}

impl From<String> for PrivacyService {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(service) => service,
            Err(never) => match never {},
        }
    }
}

impl From<PrivacyService> for String {
    fn from(value: PrivacyService) -> Self {
        value.key().to_string()
    }
}

impl fmt::Display for PrivacyService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// How an application is identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// Bundle identifier (`com.example.app`).
    #[default]
    BundleId,
    /// Absolute path to an executable.
    Path,
    /// Designated code requirement string.
    CodeRequirement,
}

impl IdentifierKind {
    /// Value written to `IdentifierType`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BundleId => "bundleID",
            Self::Path => "path",
            Self::CodeRequirement => "codeRequirement",
        }
    }

    /// Parses an `IdentifierType` value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bundleID" => Some(Self::BundleId),
            "path" => Some(Self::Path),
            "codeRequirement" => Some(Self::CodeRequirement),
            _ => None,
        }
    }
}

/// Target of an Apple Events authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppleEventsReceiver {
    /// Receiver identifier.
    pub identifier: String,
    /// Receiver identifier kind.
    #[serde(default)]
    pub identifier_kind: IdentifierKind,
    /// Receiver code requirement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_requirement: Option<String>,
}

/// What a screen-capture authorization covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureScope {
    /// Whole display contents.
    Display,
    /// Individual windows only.
    Window,
    /// System audio only.
    Audio,
}

impl CaptureScope {
    /// Value written to the interchange format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Display => "display",
            Self::Window => "window",
            Self::Audio => "audio",
        }
    }

    /// Parses an interchange value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "display" => Some(Self::Display),
            "window" => Some(Self::Window),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }
}

/// Interchange value of the authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    /// Access granted.
    Allow,
    /// Access denied.
    Deny,
    /// Standard users may decide for themselves.
    AllowStandardUserToSetSystemService,
}

impl Authorization {
    /// Interchange value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "Allow",
            Self::Deny => "Deny",
            Self::AllowStandardUserToSetSystemService => "AllowStandardUserToSetSystemService",
        }
    }

    /// Parses an interchange value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Allow" => Some(Self::Allow),
            "Deny" => Some(Self::Deny),
            "AllowStandardUserToSetSystemService" => Some(Self::AllowStandardUserToSetSystemService),
            _ => None,
        }
    }
}

/// One privacy authorization entry.
///
/// A document holds at most one entry per [`PrivacyService`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacyAuthorization {
    /// Service being authorized.
    pub service: PrivacyService,
    /// Application identifier.
    pub identifier: String,
    /// How [`PrivacyAuthorization::identifier`] is interpreted.
    #[serde(default)]
    pub identifier_kind: IdentifierKind,
    /// Designated code requirement of the application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_requirement: Option<String>,
    /// Allowed (`true`) or denied (`false`).
    pub allowed: bool,
    /// Lets standard users change the decision.
    #[serde(default)]
    pub user_override: bool,
    /// Free-form comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Apple Events receiver (AppleEvents only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<AppleEventsReceiver>,
    /// Capture scope (`ScreenCapture` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_scope: Option<CaptureScope>,
}

impl PrivacyAuthorization {
    /// Creates an entry for a bundle identifier.
    #[must_use]
    pub fn new(service: PrivacyService, identifier: impl Into<String>, allowed: bool) -> Self {
        Self {
            service: service.normalized(),
            identifier: identifier.into(),
            identifier_kind: IdentifierKind::BundleId,
            code_requirement: None,
            allowed,
            user_override: false,
            comment: None,
            receiver: None,
            capture_scope: None,
        }
    }

    /// Sets the identifier kind.
    #[must_use]
    pub const fn with_identifier_kind(mut self, kind: IdentifierKind) -> Self {
        self.identifier_kind = kind;
        self
    }

    /// Sets the code requirement.
    #[must_use]
    pub fn with_code_requirement(mut self, requirement: impl Into<String>) -> Self {
        self.code_requirement = Some(requirement.into());
        self
    }

    /// Sets the user-override flag.
    #[must_use]
    pub const fn with_user_override(mut self, user_override: bool) -> Self {
        self.user_override = user_override;
        self
    }

    /// Sets the comment.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Sets the Apple Events receiver.
    #[must_use]
    pub fn with_receiver(mut self, receiver: AppleEventsReceiver) -> Self {
        self.receiver = Some(receiver);
        self
    }

    /// Sets the capture scope.
    #[must_use]
    pub const fn with_capture_scope(mut self, scope: CaptureScope) -> Self {
        self.capture_scope = Some(scope);
        self
    }

    /// The decision written to the interchange format.
    #[must_use]
    pub const fn authorization(&self) -> Authorization {
        match (self.allowed, self.user_override) {
            (true, true) => Authorization::AllowStandardUserToSetSystemService,
            (true, false) => Authorization::Allow,
            (false, _) => Authorization::Deny,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_service_keys_round_trip_through_strings() {
        for key in ["Camera", "AppleEvents", "SystemPolicyAllFiles"] {
            let service: PrivacyService = key.parse().unwrap();
            assert_eq!(service.key(), key);
            assert!(!matches!(service, PrivacyService::Custom(_)));
        }
        let custom: PrivacyService = "BluetoothAlways".parse().unwrap();
        assert_eq!(custom, PrivacyService::Custom("BluetoothAlways".into()));
    }

    #[test]
    fn test_service_serde_as_string() {
        let json = serde_json::to_string(&PrivacyService::ScreenCapture).unwrap();
        assert_eq!(json, r#""ScreenCapture""#);
        let back: PrivacyService = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PrivacyService::ScreenCapture);
    }

    #[test]
    fn test_authorization_mapping() {
        let entry = PrivacyAuthorization::new(PrivacyService::Camera, "com.example.app", true);
        assert_eq!(entry.authorization(), Authorization::Allow);
        assert_eq!(
            entry.clone().with_user_override(true).authorization(),
            Authorization::AllowStandardUserToSetSystemService
        );
        let denied = PrivacyAuthorization::new(PrivacyService::Camera, "com.example.app", false)
            .with_user_override(true);
        assert_eq!(denied.authorization(), Authorization::Deny);
    }

    #[test]
    fn test_entry_from_json() {
        let entry: PrivacyAuthorization = serde_json::from_str(
            r#"{"service":"AppleEvents","identifier":"com.example.app","allowed":true,
                "receiver":{"identifier":"com.apple.finder"}}"#,
        )
        .unwrap();
        assert_eq!(entry.service, PrivacyService::AppleEvents);
        assert_eq!(entry.identifier_kind, IdentifierKind::BundleId);
        assert_eq!(
            entry.receiver.map(|r| r.identifier),
            Some("com.apple.finder".to_string())
        );
    }

    #[test]
    fn test_identifier_kind_strings() {
        for kind in [
            IdentifierKind::BundleId,
            IdentifierKind::Path,
            IdentifierKind::CodeRequirement,
        ] {
            assert_eq!(IdentifierKind::parse(kind.as_str()), Some(kind));
        }
    }
}
