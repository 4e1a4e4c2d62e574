//! Connectivity probing.
//!
//! A host is reachable when any candidate path produces an HTTP response,
//! whatever its status. Authorization-denied answers (401/403) count: they
//! prove the server stack is alive even though it wants credentials. Only
//! network-layer failures on every candidate mean unreachable.

use crate::endpoints::ApiSurface;
use crate::error::{Error, NetworkFailure, Result};
use crate::http;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-attempt probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// What a responding server told us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    /// Success or redirect status.
    Healthy(u16),
    /// 401 or 403: alive, but wants credentials.
    AuthRequired(u16),
    /// Any other status: alive, but this path is not served as expected.
    Responded(u16),
}

impl Reachability {
    /// Classifies an HTTP status.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            200..=399 => Self::Healthy(status),
            401 | 403 => Self::AuthRequired(status),
            _ => Self::Responded(status),
        }
    }

    /// The raw status code.
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            Self::Healthy(s) | Self::AuthRequired(s) | Self::Responded(s) => s,
        }
    }
}

/// One probe attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeAttempt {
    /// Requested URL.
    pub url: String,
    /// Response classification, or the network failure.
    pub outcome: std::result::Result<Reachability, NetworkFailure>,
}

/// Result of probing a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    /// Attempts in the order made. The last one answered if reachable.
    pub attempts: Vec<ProbeAttempt>,
}

impl ProbeReport {
    /// Returns `true` if any attempt got a response.
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.reachability().is_some()
    }

    /// The classification of the answering attempt.
    #[must_use]
    pub fn reachability(&self) -> Option<Reachability> {
        self.attempts.iter().find_map(|a| a.outcome.ok())
    }

    /// Converts to a result, failing when nothing answered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unreachable`] if every attempt failed at the network layer.
    pub fn into_result(self) -> Result<Self> {
        if self.is_reachable() {
            Ok(self)
        } else {
            Err(Error::Unreachable {
                attempts: self.attempts.len(),
            })
        }
    }
}

/// Reachability prober.
#[derive(Debug, Clone)]
pub struct Prober {
    http_client: Client,
    timeout: Duration,
}

impl Prober {
    /// Creates a prober with the given per-attempt timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            http_client: http::client(timeout)?,
            timeout,
        })
    }

    /// Probes candidate paths in order, stopping at the first response.
    pub async fn probe(&self, surface: &ApiSurface) -> ProbeReport {
        let mut attempts = Vec::with_capacity(surface.probe_paths.len());

        for path in &surface.probe_paths {
            let url = match surface.resolve(path) {
                Ok(url) => url,
                Err(e) => {
                    warn!("Skipping probe path {path}: {e}");
                    continue;
                }
            };

            let result = self
                .http_client
                .get(url.clone())
                .timeout(self.timeout)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let reachability = Reachability::from_status(response.status().as_u16());
                    log_reachability(&url, reachability);
                    attempts.push(ProbeAttempt {
                        url: url.to_string(),
                        outcome: Ok(reachability),
                    });
                    return ProbeReport { attempts };
                }
                Err(e) => {
                    let kind = NetworkFailure::classify(&e);
                    debug!("Probe {url} failed: {kind}");
                    attempts.push(ProbeAttempt {
                        url: url.to_string(),
                        outcome: Err(kind),
                    });
                }
            }
        }

        warn!(
            "{} unreachable after {} probe attempt(s)",
            surface.base_url,
            attempts.len()
        );
        ProbeReport { attempts }
    }
}

// 401/403 still count as reachable; the status is logged so a misconfigured
// server can be told apart from a healthy one.
fn log_reachability(url: &url::Url, reachability: Reachability) {
    match reachability {
        Reachability::Healthy(status) => info!("Probe {url} answered {status}"),
        Reachability::AuthRequired(status) => {
            info!("Probe {url} answered {status}; treating server as reachable");
        }
        Reachability::Responded(status) => {
            warn!("Probe {url} answered unexpected status {status}; treating server as reachable");
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
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn surface(base: &str) -> ApiSurface {
        ApiSurface::new("Test", base).unwrap().with_probe_paths(vec![
            "api/v1/ping".into(),
            "api/v1/jamf-pro-version".into(),
            "JSSCheckConnection".into(),
        ])
    }

    fn prober() -> Prober {
        Prober::new(Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_classification() {
        assert_eq!(Reachability::from_status(200), Reachability::Healthy(200));
        assert_eq!(Reachability::from_status(302), Reachability::Healthy(302));
        assert_eq!(Reachability::from_status(401), Reachability::AuthRequired(401));
        assert_eq!(Reachability::from_status(403), Reachability::AuthRequired(403));
        assert_eq!(Reachability::from_status(500), Reachability::Responded(500));
    }

    #[tokio::test]
    async fn test_reachable_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/ping"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let report = prober().probe(&surface(&server.uri())).await;
        assert!(report.is_reachable());
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(report.reachability(), Some(Reachability::Healthy(200)));
    }

    #[tokio::test]
    async fn test_reachable_on_401_and_403() {
        for status in [401, 403] {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;

            let report = prober().probe(&surface(&server.uri())).await;
            assert_eq!(
                report.reachability(),
                Some(Reachability::AuthRequired(status))
            );
            report.into_result().unwrap();
        }
    }

    #[tokio::test]
    async fn test_unreachable_when_every_attempt_fails() {
        // Bind and drop a listener so the port refuses connections.
        let uri = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}", listener.local_addr().unwrap())
        };

        let report = prober().probe(&surface(&uri)).await;
        assert!(!report.is_reachable());
        assert_eq!(report.attempts.len(), 3);
        assert!(report.attempts.iter().all(|a| a.outcome.is_err()));
        assert!(matches!(
            report.into_result(),
            Err(Error::Unreachable { attempts: 3 })
        ));
    }
}
