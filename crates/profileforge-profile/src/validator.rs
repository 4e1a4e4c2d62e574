//! Document validation.
//!
//! Three passes run in order: structural, unit-level, then compliance.
//! Each pass assumes the previous one found no errors, so a pass is skipped
//! once an earlier pass has reported one. Only [`ValidationReport::errors`]
//! block export and submission.

use crate::document::{Document, DocumentUnit, PrivacyUnit, Scope};
use crate::privacy::{IdentifierKind, PrivacyAuthorization, PrivacyService};
use crate::unit::{ConfigUnit, Platform, lookup};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Validation pass that produced an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValidationPass {
    /// Required top-level fields and identifier shape.
    Structural,
    /// Per-unit required settings and privacy entry rules.
    Unit,
    /// Cross-cutting policy checks.
    Compliance,
}

impl fmt::Display for ValidationPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Structural => "structural",
            Self::Unit => "unit",
            Self::Compliance => "compliance",
        })
    }
}

/// A single finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Pass that found it.
    pub pass: ValidationPass,
    /// Unit the issue concerns, if any.
    pub unit: Option<Uuid>,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    fn new(pass: ValidationPass, unit: Option<Uuid>, message: impl Into<String>) -> Self {
        Self {
            pass,
            unit,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.pass, self.message)
    }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Blocking problems.
    pub errors: Vec<ValidationIssue>,
    /// Non-blocking problems.
    pub warnings: Vec<ValidationIssue>,
    /// Non-blocking policy findings.
    pub compliance_issues: Vec<ValidationIssue>,
    /// Improvements worth considering.
    pub suggestions: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Returns `true` if there are no errors.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// The first blocking error, if any.
    #[must_use]
    pub fn first_error(&self) -> Option<&ValidationIssue> {
        self.errors.first()
    }

    fn has_errors_from(&self, pass: ValidationPass) -> bool {
        self.errors.iter().any(|e| e.pass == pass)
    }
}

/// Validates a document.
///
/// The result depends only on `document`; validating the same document
/// twice yields equal reports.
#[must_use]
pub fn validate(document: &Document) -> ValidationReport {
    let mut report = ValidationReport::default();

    structural_pass(document, &mut report);
    if report.has_errors_from(ValidationPass::Structural) {
        debug!("Structural pass failed; skipping remaining passes");
        return report;
    }

    unit_pass(document, &mut report);
    if report.has_errors_from(ValidationPass::Unit) {
        debug!("Unit pass failed; skipping compliance pass");
        return report;
    }

    compliance_pass(document, &mut report);
    debug!(
        "Validated '{}': {} errors, {} warnings, {} compliance issues, {} suggestions",
        document.identifier,
        report.errors.len(),
        report.warnings.len(),
        report.compliance_issues.len(),
        report.suggestions.len()
    );
    report
}

/// Returns `true` for a reverse-DNS style identifier such as `com.example.app`.
fn is_reverse_dns(identifier: &str) -> bool {
    let labels: Vec<&str> = identifier.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        })
        && labels[0].starts_with(|c: char| c.is_ascii_alphabetic())
}

fn structural_pass(document: &Document, report: &mut ValidationReport) {
    const PASS: ValidationPass = ValidationPass::Structural;

    if document.name.trim().is_empty() {
        report
            .errors
            .push(ValidationIssue::new(PASS, None, "Profile name is required"));
    }
    if document.identifier.trim().is_empty() {
        report
            .errors
            .push(ValidationIssue::new(PASS, None, "Profile identifier is required"));
    } else if !is_reverse_dns(&document.identifier) {
        report.errors.push(ValidationIssue::new(
            PASS,
            None,
            format!(
                "Profile identifier '{}' is not a reverse-DNS identifier",
                document.identifier
            ),
        ));
    }
    if document.organization.trim().is_empty() {
        report
            .warnings
            .push(ValidationIssue::new(PASS, None, "Organization is empty"));
    }
    if document.description.trim().is_empty() {
        report.suggestions.push(ValidationIssue::new(
            PASS,
            None,
            "Add a description so the profile is recognisable on devices",
        ));
    }
    if document.units.is_empty() {
        report
            .errors
            .push(ValidationIssue::new(PASS, None, "Profile contains no units"));
    }

    let mut seen = HashSet::new();
    for unit in &document.units {
        let id = unit.instance_id();
        if !seen.insert(id) {
            report.errors.push(ValidationIssue::new(
                PASS,
                Some(id),
                format!("Duplicate unit instance id {id}"),
            ));
        }
        if !is_reverse_dns(unit.unit_type()) {
            report.errors.push(ValidationIssue::new(
                PASS,
                Some(id),
                format!("Unit type '{}' is malformed", unit.unit_type()),
            ));
        }
    }
}

fn unit_pass(document: &Document, report: &mut ValidationReport) {
    for unit in &document.units {
        match unit {
            DocumentUnit::Settings(unit) => check_settings_unit(unit, report),
            DocumentUnit::Privacy(unit) => check_privacy_unit(unit, report),
        }
    }
}

fn check_settings_unit(unit: &ConfigUnit, report: &mut ValidationReport) {
    const PASS: ValidationPass = ValidationPass::Unit;
    let id = Some(unit.instance_id);

    if unit.display_name.trim().is_empty() {
        report.suggestions.push(ValidationIssue::new(
            PASS,
            id,
            format!("Give the {} unit a display name", unit.unit_type),
        ));
    }
    if !unit.enabled {
        report.warnings.push(ValidationIssue::new(
            PASS,
            id,
            format!("Unit '{}' is disabled", unit.display_name),
        ));
    }

    for key in unit.settings.keys().filter(|k| k.starts_with("Payload")) {
        report.errors.push(ValidationIssue::new(
            PASS,
            id,
            format!(
                "Setting {key} of unit '{}' uses the reserved Payload prefix",
                unit.display_name
            ),
        ));
    }

    let Some(definition) = unit.definition() else {
        report.warnings.push(ValidationIssue::new(
            PASS,
            id,
            format!("Unknown unit type '{}'; settings are not checked", unit.unit_type),
        ));
        return;
    };

    for (key, kind) in definition.required_settings {
        match unit.setting(key) {
            None => report.errors.push(ValidationIssue::new(
                PASS,
                id,
                format!("Unit '{}' is missing required setting {key}", unit.display_name),
            )),
            Some(value) if value.kind() != *kind => report.errors.push(ValidationIssue::new(
                PASS,
                id,
                format!(
                    "Setting {key} of unit '{}' must be {kind:?}, found {:?}",
                    unit.display_name,
                    value.kind()
                ),
            )),
            Some(value) if value.is_blank() => report.errors.push(ValidationIssue::new(
                PASS,
                id,
                format!("Setting {key} of unit '{}' is empty", unit.display_name),
            )),
            Some(_) => {}
        }
    }
}

fn check_privacy_unit(unit: &PrivacyUnit, report: &mut ValidationReport) {
    const PASS: ValidationPass = ValidationPass::Unit;
    let id = Some(unit.instance_id);

    if unit.entries.is_empty() {
        report.errors.push(ValidationIssue::new(
            PASS,
            id,
            "Privacy unit has no authorizations",
        ));
    }

    for entry in &unit.entries {
        check_privacy_entry(entry, id, report);
    }
}

fn check_privacy_entry(entry: &PrivacyAuthorization, id: Option<Uuid>, report: &mut ValidationReport) {
    const PASS: ValidationPass = ValidationPass::Unit;
    let service = &entry.service;

    if entry.identifier.trim().is_empty() {
        report.errors.push(ValidationIssue::new(
            PASS,
            id,
            format!("{service} authorization has no target identifier"),
        ));
    } else if entry.identifier_kind == IdentifierKind::Path && !entry.identifier.starts_with('/') {
        report.errors.push(ValidationIssue::new(
            PASS,
            id,
            format!(
                "{service} authorization path '{}' must be absolute",
                entry.identifier
            ),
        ));
    }

    if *service == PrivacyService::AppleEvents
        && entry
            .receiver
            .as_ref()
            .is_none_or(|r| r.identifier.trim().is_empty())
    {
        report.errors.push(ValidationIssue::new(
            PASS,
            id,
            format!(
                "AppleEvents authorization for '{}' needs a receiver identifier",
                entry.identifier
            ),
        ));
    }

    if *service == PrivacyService::ScreenCapture && entry.capture_scope.is_none() {
        report.errors.push(ValidationIssue::new(
            PASS,
            id,
            format!(
                "ScreenCapture authorization for '{}' needs a capture scope",
                entry.identifier
            ),
        ));
    }

    if entry.identifier_kind != IdentifierKind::CodeRequirement
        && entry
            .code_requirement
            .as_deref()
            .is_none_or(|r| r.trim().is_empty())
    {
        report.warnings.push(ValidationIssue::new(
            PASS,
            id,
            format!(
                "{service} authorization for '{}' has no code requirement",
                entry.identifier
            ),
        ));
    }
}

fn compliance_pass(document: &Document, report: &mut ValidationReport) {
    const PASS: ValidationPass = ValidationPass::Compliance;
    let platform = document.platform;

    let mut type_counts: HashMap<&str, usize> = HashMap::new();
    for unit in &document.units {
        *type_counts.entry(unit.unit_type()).or_default() += 1;
    }
    // Walk in document order so the report is stable.
    let mut reported = HashSet::new();
    for unit in &document.units {
        let unit_type = unit.unit_type();
        let unique = lookup(unit_type).is_some_and(|d| d.unique);
        if unique && type_counts[unit_type] > 1 && reported.insert(unit_type) {
            report.errors.push(ValidationIssue::new(
                PASS,
                Some(unit.instance_id()),
                format!("Only one {unit_type} unit is allowed per profile"),
            ));
        }
    }

    for unit in &document.units {
        let id = Some(unit.instance_id());
        let unit_type = unit.unit_type();
        if lookup(unit_type).is_some_and(|d| d.is_deprecated_on(platform)) {
            report.compliance_issues.push(ValidationIssue::new(
                PASS,
                id,
                format!("{unit_type} is deprecated on {platform}"),
            ));
        }
        match unit {
            DocumentUnit::Settings(unit) => {
                if !unit.platforms.is_empty() && !unit.platforms.contains(&platform) {
                    report.compliance_issues.push(ValidationIssue::new(
                        PASS,
                        id,
                        format!("Unit '{}' does not apply to {platform}", unit.display_name),
                    ));
                }
            }
            DocumentUnit::Privacy(privacy) => {
                check_privacy_compliance(document.scope, platform, privacy, report);
            }
        }
    }
}

fn check_privacy_compliance(
    scope: Scope,
    platform: Platform,
    unit: &PrivacyUnit,
    report: &mut ValidationReport,
) {
    const PASS: ValidationPass = ValidationPass::Compliance;
    let id = Some(unit.instance_id);

    if scope == Scope::User {
        report.errors.push(ValidationIssue::new(
            PASS,
            id,
            "Privacy authorizations can only be installed with System scope",
        ));
    }
    if platform != Platform::MacOs {
        report.compliance_issues.push(ValidationIssue::new(
            PASS,
            id,
            format!("Privacy authorizations are not supported on {platform}"),
        ));
    }

    for entry in &unit.entries {
        let service = &entry.service;
        if service.requires_user_consent() && entry.allowed && !entry.user_override {
            report.errors.push(ValidationIssue::new(
                PASS,
                id,
                format!(
                    "{service} cannot be silently allowed for '{}'; deny it or let standard users decide",
                    entry.identifier
                ),
            ));
        }
        if service.deny_only() && entry.allowed {
            report.compliance_issues.push(ValidationIssue::new(
                PASS,
                id,
                format!(
                    "{service} can only be denied by profile; the allow for '{}' leaves the decision to the user",
                    entry.identifier
                ),
            ));
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
    use crate::ProfileComposer;
    use crate::privacy::{AppleEventsReceiver, CaptureScope};
    use proptest::prelude::*;

    fn composer() -> ProfileComposer {
        ProfileComposer::new("Acme Baseline", "com.acme.baseline")
            .with_organization("Acme")
            .with_description("Baseline settings")
    }

    fn wifi() -> ConfigUnit {
        ConfigUnit::new("com.apple.wifi.managed", "Office").with_setting("SSID_STR", "acme")
    }

    fn camera(allowed: bool) -> PrivacyAuthorization {
        PrivacyAuthorization::new(PrivacyService::Camera, "us.zoom.xos", allowed)
            .with_code_requirement("identifier \"us.zoom.xos\"")
    }

    #[test]
    fn test_clean_document_is_valid() {
        let mut c = composer();
        c.add_unit(wifi());
        let report = validate(&c.build());
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(report.warnings.is_empty());
        assert!(report.suggestions.is_empty());
    }

    #[test]
    fn test_structural_errors_skip_later_passes() {
        let mut c = ProfileComposer::new("", "not an identifier");
        c.add_unit(ConfigUnit::new("com.apple.wifi.managed", "Office"));
        let report = validate(&c.build());
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors.iter().all(|e| e.pass == ValidationPass::Structural));
    }

    #[test]
    fn test_empty_document_is_an_error() {
        let report = validate(&composer().build());
        assert!(!report.is_valid());
        assert!(report.first_error().unwrap().message.contains("no units"));
    }

    #[test]
    fn test_reserved_setting_key_is_an_error() {
        let mut c = composer();
        c.add_unit(wifi().with_setting("PayloadType", "com.acme.other"));
        let report = validate(&c.build());
        assert!(!report.is_valid());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].pass, ValidationPass::Unit);
        assert!(report.errors[0].message.contains("PayloadType"));
    }

    #[test]
    fn test_reverse_dns() {
        assert!(is_reverse_dns("com.acme.profile"));
        assert!(is_reverse_dns("com.apple.TCC.configuration-profile-policy"));
        assert!(!is_reverse_dns("acme"));
        assert!(!is_reverse_dns("com..acme"));
        assert!(!is_reverse_dns("1com.acme"));
        assert!(!is_reverse_dns("com.acme profile"));
    }

    #[test]
    fn test_missing_required_setting() {
        let mut c = composer();
        c.add_unit(ConfigUnit::new("com.apple.wifi.managed", "Office"));
        let report = validate(&c.build());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].pass, ValidationPass::Unit);
        assert!(report.errors[0].message.contains("SSID_STR"));
    }

    #[test]
    fn test_wrong_setting_kind() {
        let mut c = composer();
        c.add_unit(
            ConfigUnit::new("com.apple.security.firewall", "Firewall")
                .with_setting("EnableFirewall", "yes"),
        );
        let report = validate(&c.build());
        assert!(report.errors[0].message.contains("EnableFirewall"));
    }

    #[test]
    fn test_privacy_entry_rules() {
        let mut c = composer();
        c.set_privacy_authorization(PrivacyAuthorization::new(PrivacyService::Camera, " ", false));
        c.set_privacy_authorization(PrivacyAuthorization::new(
            PrivacyService::AppleEvents,
            "com.acme.agent",
            true,
        ));
        c.set_privacy_authorization(
            PrivacyAuthorization::new(PrivacyService::ScreenCapture, "com.acme.rec", false)
                .with_code_requirement("anchor apple generic"),
        );
        let report = validate(&c.build());
        let messages: Vec<&str> = report.errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages.len(), 3, "{messages:?}");
        assert!(messages[0].contains("no target identifier"));
        assert!(messages[1].contains("receiver"));
        assert!(messages[2].contains("capture scope"));
    }

    #[test]
    fn test_complete_privacy_entries_pass() {
        let mut c = composer();
        c.set_privacy_authorization(
            PrivacyAuthorization::new(PrivacyService::AppleEvents, "com.acme.agent", true)
                .with_code_requirement("anchor apple generic")
                .with_receiver(AppleEventsReceiver {
                    identifier: "com.apple.finder".into(),
                    identifier_kind: IdentifierKind::BundleId,
                    code_requirement: None,
                }),
        );
        c.set_privacy_authorization(
            PrivacyAuthorization::new(PrivacyService::ScreenCapture, "com.acme.rec", true)
                .with_code_requirement("anchor apple generic")
                .with_user_override(true)
                .with_capture_scope(CaptureScope::Window),
        );
        let report = validate(&c.build());
        assert!(report.is_valid(), "{:?}", report.errors);
    }

    #[test]
    fn test_relative_path_identifier() {
        let mut c = composer();
        c.set_privacy_authorization(
            PrivacyAuthorization::new(PrivacyService::SystemPolicyAllFiles, "usr/bin/backup", true)
                .with_identifier_kind(IdentifierKind::Path),
        );
        let report = validate(&c.build());
        assert!(report.errors[0].message.contains("must be absolute"));
    }

    #[test]
    fn test_allowed_camera_is_not_an_error() {
        let mut c = composer();
        c.set_privacy_authorization(camera(true));
        let report = validate(&c.build());
        assert!(report.is_valid(), "{:?}", report.errors);
        assert_eq!(report.compliance_issues.len(), 1);
    }

    #[test]
    fn test_silently_allowed_screen_capture_is_an_error() {
        let mut c = composer();
        c.set_privacy_authorization(
            PrivacyAuthorization::new(PrivacyService::ScreenCapture, "com.acme.rec", true)
                .with_code_requirement("anchor apple generic")
                .with_capture_scope(CaptureScope::Display),
        );
        let report = validate(&c.build());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].pass, ValidationPass::Compliance);
    }

    #[test]
    fn test_user_scope_privacy_is_an_error() {
        let mut c = composer().with_scope(Scope::User);
        c.set_privacy_authorization(camera(false));
        let report = validate(&c.build());
        assert!(!report.is_valid());
        assert!(report.errors[0].message.contains("System scope"));
    }

    #[test]
    fn test_duplicate_unique_type() {
        let mut c = composer();
        for _ in 0..2 {
            c.add_unit(
                ConfigUnit::new("com.apple.security.firewall", "Firewall")
                    .with_setting("EnableFirewall", true),
            );
        }
        let report = validate(&c.build());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].pass, ValidationPass::Compliance);
    }

    #[test]
    fn test_deprecated_and_platform_mismatch_do_not_block() {
        let mut c = composer();
        c.add_unit(ConfigUnit::new("com.apple.mcxMenuExtras", "Menu Extras"));
        c.add_unit(wifi().with_platforms(vec![Platform::Ios]));
        let report = validate(&c.build());
        assert!(report.is_valid());
        assert_eq!(report.compliance_issues.len(), 2);
    }

    #[test]
    fn test_unknown_and_disabled_units_warn() {
        let mut c = composer();
        c.add_unit(ConfigUnit::new("com.example.custom", "Custom").with_enabled(false));
        let report = validate(&c.build());
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_validate_is_deterministic(
            name in "[A-Za-z ]{0,12}",
            identifier in "[a-z]{1,6}(\\.[a-z]{1,6}){0,3}",
            ssid in "[a-z]{0,8}",
            allowed in any::<bool>(),
        ) {
            let mut c = ProfileComposer::new(name, identifier);
            c.add_unit(ConfigUnit::new("com.apple.wifi.managed", "Wi-Fi").with_setting("SSID_STR", ssid));
            c.set_privacy_authorization(camera(allowed));
            let document = c.build();
            prop_assert_eq!(validate(&document), validate(&document));
        }
    }
}
