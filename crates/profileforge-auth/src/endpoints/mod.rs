//! Candidate endpoint sets for the supported API surfaces.

use crate::credentials::ExchangeMode;
use crate::error::{Error, Result};
use url::Url;

/// Health paths tried by the prober, modern first.
pub const DEFAULT_PROBE_PATHS: &[&str] = &[
    "api/v1/ping",
    "api/v1/jamf-pro-version",
    "JSSCheckConnection",
];

/// Token paths for client-credential exchange.
pub const DEFAULT_CLIENT_CREDENTIAL_PATHS: &[&str] = &["api/oauth/token", "api/v1/oauth/token"];

/// Token paths for basic exchange, modern first.
pub const DEFAULT_BASIC_PATHS: &[&str] = &["api/v1/auth/token", "uapi/auth/tokens"];

/// Paths that invalidate a bearer token on logout.
pub const DEFAULT_INVALIDATE_PATHS: &[&str] = &["api/v1/auth/invalidate-token"];

/// The remote API surface of one server: base URL plus ordered candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSurface {
    /// Surface name (e.g., "Jamf Pro").
    pub name: String,
    /// Server base URL, always ending in `/`.
    pub base_url: Url,
    /// Ordered probe paths.
    pub probe_paths: Vec<String>,
    /// Ordered client-credential token paths.
    pub client_credential_paths: Vec<String>,
    /// Ordered basic token paths.
    pub basic_paths: Vec<String>,
    /// Token invalidation paths.
    pub invalidate_paths: Vec<String>,
}

impl ApiSurface {
    /// Creates a surface with no candidate paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or not HTTP(S).
    pub fn new(name: impl Into<String>, base_url: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            base_url: normalize_base(base_url.as_ref())?,
            probe_paths: Vec::new(),
            client_credential_paths: Vec::new(),
            basic_paths: Vec::new(),
            invalidate_paths: Vec::new(),
        })
    }

    /// Jamf Pro style surface covering the modern and classic APIs.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn jamf(base_url: impl AsRef<str>) -> Result<Self> {
        Ok(Self::new("Jamf Pro", base_url)?
            .with_probe_paths(owned(DEFAULT_PROBE_PATHS))
            .with_token_paths(
                ExchangeMode::ClientCredentials,
                owned(DEFAULT_CLIENT_CREDENTIAL_PATHS),
            )
            .with_token_paths(ExchangeMode::Basic, owned(DEFAULT_BASIC_PATHS))
            .with_invalidate_paths(owned(DEFAULT_INVALIDATE_PATHS)))
    }

    /// Sets the probe paths.
    #[must_use]
    pub fn with_probe_paths(mut self, paths: Vec<String>) -> Self {
        self.probe_paths = paths;
        self
    }

    /// Sets the token paths for one exchange mode.
    #[must_use]
    pub fn with_token_paths(mut self, mode: ExchangeMode, paths: Vec<String>) -> Self {
        match mode {
            ExchangeMode::ClientCredentials => self.client_credential_paths = paths,
            ExchangeMode::Basic => self.basic_paths = paths,
        }
        self
    }

    /// Sets the token invalidation paths.
    #[must_use]
    pub fn with_invalidate_paths(mut self, paths: Vec<String>) -> Self {
        self.invalidate_paths = paths;
        self
    }

    /// Token paths for the given mode.
    #[must_use]
    pub fn token_paths(&self, mode: ExchangeMode) -> &[String] {
        match mode {
            ExchangeMode::ClientCredentials => &self.client_credential_paths,
            ExchangeMode::Basic => &self.basic_paths,
        }
    }

    /// Resolves a path relative to the base URL, keeping any base path prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the joined URL is invalid.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Resolves every path in order.
    ///
    /// # Errors
    ///
    /// Returns an error if any joined URL is invalid.
    pub fn resolve_all(&self, paths: &[String]) -> Result<Vec<Url>> {
        paths.iter().map(|p| self.resolve(p)).collect()
    }

    /// Validates that at least one probe and one token path exist.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.probe_paths.is_empty() {
            return Err(Error::InvalidConfig("no probe paths".into()));
        }
        if self.client_credential_paths.is_empty() && self.basic_paths.is_empty() {
            return Err(Error::InvalidConfig("no token paths".into()));
        }
        Ok(())
    }
}

fn owned(paths: &[&str]) -> Vec<String> {
    paths.iter().map(ToString::to_string).collect()
}

fn normalize_base(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidConfig(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(Error::InvalidConfig("server address has no host".into()));
    }
    url.set_query(None);
    url.set_fragment(None);
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
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

    #[test]
    fn test_jamf_surface() {
        let surface = ApiSurface::jamf("https://acme.example.com").unwrap();
        assert_eq!(surface.name, "Jamf Pro");
        assert_eq!(surface.probe_paths.len(), 3);
        assert_eq!(surface.token_paths(ExchangeMode::ClientCredentials).len(), 2);
        assert_eq!(surface.token_paths(ExchangeMode::Basic).len(), 2);
        surface.validate().unwrap();
    }

    #[test]
    fn test_resolve_root() {
        let surface = ApiSurface::jamf("https://acme.example.com").unwrap();
        assert_eq!(
            surface.resolve("/api/oauth/token").unwrap().as_str(),
            "https://acme.example.com/api/oauth/token"
        );
    }

    #[test]
    fn test_resolve_keeps_base_path() {
        let surface = ApiSurface::jamf("https://acme.example.com:8443/jss?x=1").unwrap();
        assert_eq!(
            surface.resolve("api/v1/ping").unwrap().as_str(),
            "https://acme.example.com:8443/jss/api/v1/ping"
        );
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        assert!(matches!(
            ApiSurface::new("x", "ftp://acme.example.com"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(ApiSurface::new("x", "not a url").is_err());
    }

    #[test]
    fn test_validate_requires_paths() {
        let surface = ApiSurface::new("Custom", "https://acme.example.com").unwrap();
        assert!(surface.validate().is_err());

        let surface = surface
            .with_probe_paths(vec!["health".into()])
            .with_token_paths(ExchangeMode::Basic, vec!["token".into()]);
        surface.validate().unwrap();
    }
}
