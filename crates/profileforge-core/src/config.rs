//! Application settings.
//!
//! Settings are an explicit value handed to the services that need them;
//! nothing reads them from global state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use profileforge_auth::endpoints::{
    DEFAULT_BASIC_PATHS, DEFAULT_CLIENT_CREDENTIAL_PATHS, DEFAULT_INVALIDATE_PATHS,
    DEFAULT_PROBE_PATHS,
};
use profileforge_auth::{ApiSurface, ExchangeMode};
use profileforge_profile::Encoding;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::account::Account;
use crate::{Error, Result};

/// Application directory name under the platform config and data dirs.
const APP_DIR: &str = "profileforge";

/// Placeholder replaced by the profile name in resource paths.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Default named-resource path for profile create/update.
pub const DEFAULT_PROFILE_RESOURCE_PATH: &str = "JSSResource/osxconfigurationprofiles/name/{name}";

/// Settings that persist across sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Per-attempt probe timeout in seconds.
    pub probe_timeout_secs: u64,
    /// Per-attempt token exchange timeout in seconds.
    pub exchange_timeout_secs: u64,
    /// Per-request submission timeout in seconds.
    pub submission_timeout_secs: u64,
    /// Ordered probe paths.
    pub probe_paths: Vec<String>,
    /// Ordered client-credential token paths.
    pub client_credential_paths: Vec<String>,
    /// Ordered basic token paths.
    pub basic_paths: Vec<String>,
    /// Token invalidation paths.
    pub invalidate_paths: Vec<String>,
    /// Named-resource path for profiles; must contain `{name}`.
    pub profile_resource_path: String,
    /// Organization used when a profile does not set one.
    pub default_organization: Option<String>,
    /// Default export directory.
    pub export_dir: Option<PathBuf>,
    /// Export encoding.
    pub export_encoding: Encoding,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 10,
            exchange_timeout_secs: 30,
            submission_timeout_secs: 60,
            probe_paths: owned(DEFAULT_PROBE_PATHS),
            client_credential_paths: owned(DEFAULT_CLIENT_CREDENTIAL_PATHS),
            basic_paths: owned(DEFAULT_BASIC_PATHS),
            invalidate_paths: owned(DEFAULT_INVALIDATE_PATHS),
            profile_resource_path: DEFAULT_PROFILE_RESOURCE_PATH.to_string(),
            default_organization: None,
            export_dir: None,
            export_encoding: Encoding::Xml,
        }
    }
}

fn owned(paths: &[&str]) -> Vec<String> {
    paths.iter().map(ToString::to_string).collect()
}

impl Settings {
    /// Creates a settings builder starting from the defaults.
    #[must_use]
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Probe timeout.
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Exchange timeout.
    #[must_use]
    pub const fn exchange_timeout(&self) -> Duration {
        Duration::from_secs(self.exchange_timeout_secs)
    }

    /// Submission timeout.
    #[must_use]
    pub const fn submission_timeout(&self) -> Duration {
        Duration::from_secs(self.submission_timeout_secs)
    }

    /// Path of the settings file.
    #[must_use]
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("settings.json")
    }

    /// Directory holding the account database.
    #[must_use]
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    /// Path of the account database.
    #[must_use]
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("profileforge.db")
    }

    /// Loads settings from the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Loads settings from a file, falling back to defaults if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed, or
    /// fails [`Settings::validate`].
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {}; using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Saves settings to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Saves settings to a file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Checks internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.probe_timeout_secs == 0
            || self.exchange_timeout_secs == 0
            || self.submission_timeout_secs == 0
        {
            return Err(Error::Config("timeouts must be at least one second".into()));
        }
        if self.probe_paths.is_empty() {
            return Err(Error::Config("at least one probe path is required".into()));
        }
        if self.client_credential_paths.is_empty() && self.basic_paths.is_empty() {
            return Err(Error::Config("at least one token path is required".into()));
        }
        if !self.profile_resource_path.contains(NAME_PLACEHOLDER) {
            return Err(Error::Config(format!(
                "profile resource path must contain {NAME_PLACEHOLDER}"
            )));
        }
        Ok(())
    }

    /// Builds the API surface for an account from the configured paths.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the account's server address is unusable.
    pub fn api_surface(&self, account: &Account) -> Result<ApiSurface> {
        let surface = ApiSurface::new(account.vendor.display_name(), &account.server_url)
            .map_err(|e| Error::Config(e.to_string()))?
            .with_probe_paths(self.probe_paths.clone())
            .with_token_paths(
                ExchangeMode::ClientCredentials,
                self.client_credential_paths.clone(),
            )
            .with_token_paths(ExchangeMode::Basic, self.basic_paths.clone())
            .with_invalidate_paths(self.invalidate_paths.clone());
        Ok(surface)
    }

    /// Resolves the named-resource URL of a profile under `base`.
    ///
    /// Every `{name}` in the resource path is replaced by the name; the
    /// result is percent-encoded segment by segment, so a `/` in the name
    /// never adds a segment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `base` cannot carry a path.
    pub fn resource_url(&self, base: &Url, name: &str) -> Result<Url> {
        let mut url = base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| Error::Config(format!("{base} cannot be a base URL")))?;
            segments.pop_if_empty();
            for part in self.profile_resource_path.split('/').filter(|p| !p.is_empty()) {
                segments.push(&part.replace(NAME_PLACEHOLDER, name));
            }
        }
        Ok(url)
    }
}

/// Builder for [`Settings`].
#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    /// Sets the probe timeout.
    #[must_use]
    pub const fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.settings.probe_timeout_secs = timeout.as_secs();
        self
    }

    /// Sets the exchange timeout.
    #[must_use]
    pub const fn exchange_timeout(mut self, timeout: Duration) -> Self {
        self.settings.exchange_timeout_secs = timeout.as_secs();
        self
    }

    /// Sets the submission timeout.
    #[must_use]
    pub const fn submission_timeout(mut self, timeout: Duration) -> Self {
        self.settings.submission_timeout_secs = timeout.as_secs();
        self
    }

    /// Sets the probe paths.
    #[must_use]
    pub fn probe_paths(mut self, paths: Vec<String>) -> Self {
        self.settings.probe_paths = paths;
        self
    }

    /// Sets the token paths for an exchange mode.
    #[must_use]
    pub fn token_paths(mut self, mode: ExchangeMode, paths: Vec<String>) -> Self {
        match mode {
            ExchangeMode::ClientCredentials => self.settings.client_credential_paths = paths,
            ExchangeMode::Basic => self.settings.basic_paths = paths,
        }
        self
    }

    /// Sets the token invalidation paths.
    #[must_use]
    pub fn invalidate_paths(mut self, paths: Vec<String>) -> Self {
        self.settings.invalidate_paths = paths;
        self
    }

    /// Sets the profile resource path template.
    #[must_use]
    pub fn profile_resource_path(mut self, path: impl Into<String>) -> Self {
        self.settings.profile_resource_path = path.into();
        self
    }

    /// Sets the default organization.
    #[must_use]
    pub fn default_organization(mut self, organization: impl Into<String>) -> Self {
        self.settings.default_organization = Some(organization.into());
        self
    }

    /// Sets the export directory.
    #[must_use]
    pub fn export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings.export_dir = Some(dir.into());
        self
    }

    /// Sets the export encoding.
    #[must_use]
    pub const fn export_encoding(mut self, encoding: Encoding) -> Self {
        self.settings.export_encoding = encoding;
        self
    }

    /// Builds the settings.
    #[must_use]
    pub fn build(self) -> Settings {
        self.settings
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
    use crate::account::Vendor;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.probe_timeout(), Duration::from_secs(10));
        assert!(settings.exchange_timeout() > settings.probe_timeout());
        assert!(settings.submission_timeout() > settings.probe_timeout());
        assert_eq!(settings.probe_paths[0], "api/v1/ping");
        settings.validate().unwrap();
    }

    #[test]
    fn test_builder() {
        let settings = Settings::builder()
            .probe_timeout(Duration::from_secs(2))
            .token_paths(ExchangeMode::Basic, vec!["auth".into()])
            .default_organization("Acme")
            .export_encoding(Encoding::Binary)
            .build();
        assert_eq!(settings.probe_timeout_secs, 2);
        assert_eq!(settings.basic_paths, vec!["auth".to_string()]);
        assert_eq!(settings.default_organization.as_deref(), Some("Acme"));
        assert_eq!(settings.export_encoding, Encoding::Binary);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings::builder().export_dir("/tmp/profiles").build();

        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Settings::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"probe_timeout_secs": 5}"#).unwrap();
        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.probe_timeout_secs, 5);
        assert_eq!(loaded.exchange_timeout_secs, 30);
    }

    #[test]
    fn test_invalid_resource_path_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"profile_resource_path": "profiles"}"#).unwrap();
        assert!(matches!(
            Settings::load_from(&path),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_resource_url() {
        let settings = Settings::default();
        let base = Url::parse("https://acme.example.com/jss/").unwrap();
        let url = settings.resource_url(&base, "Wi-Fi / VPN").unwrap();
        assert_eq!(
            url.as_str(),
            "https://acme.example.com/jss/JSSResource/osxconfigurationprofiles/name/Wi-Fi%20%2F%20VPN"
        );
    }

    #[test]
    fn test_resource_url_substitutes_inside_segment() {
        let settings = Settings::builder()
            .profile_resource_path("api/profiles/name-{name}.mobileconfig")
            .build();
        let base = Url::parse("https://acme.example.com").unwrap();
        let url = settings.resource_url(&base, "Acme Wi-Fi").unwrap();
        assert_eq!(
            url.as_str(),
            "https://acme.example.com/api/profiles/name-Acme%20Wi-Fi.mobileconfig"
        );
    }

    #[test]
    fn test_api_surface_uses_configured_paths() {
        let settings = Settings::builder().probe_paths(vec!["health".into()]).build();
        let account = Account::new("Acme", Vendor::Kandji, "https://acme.example.com");
        let surface = settings.api_surface(&account).unwrap();
        assert_eq!(surface.name, "Kandji");
        assert_eq!(surface.probe_paths, vec!["health".to_string()]);
        assert_eq!(
            surface.token_paths(ExchangeMode::ClientCredentials),
            settings.client_credential_paths.as_slice()
        );
    }
}
