//! Credential exchange against candidate token endpoints.

mod basic;
mod client_credentials;

use crate::credentials::ExchangeCredentials;
use crate::endpoints::ApiSurface;
use crate::error::{Error, Result};
use crate::http;
use crate::token::{Token, TokenResponse};
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default timeout for a single exchange attempt.
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

/// A successful exchange.
#[derive(Debug, Clone)]
pub struct Exchange {
    /// Normalized bearer token.
    pub token: Token,
    /// Endpoint that accepted the credentials.
    pub endpoint: Url,
}

/// Exchanges credentials for bearer tokens.
#[derive(Debug, Clone)]
pub struct TokenExchanger {
    http_client: Client,
}

impl TokenExchanger {
    /// Creates an exchanger with the given per-attempt timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            http_client: http::client(timeout)?,
        })
    }

    /// Tries each candidate token endpoint in order and returns the first success.
    ///
    /// When every candidate fails, the most specific failure is returned
    /// (see [`Error::specificity`]); ties keep the earliest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoCandidates`] if the surface has no paths for the
    /// credential mode, otherwise the most specific candidate failure.
    pub async fn exchange(
        &self,
        surface: &ApiSurface,
        credentials: &ExchangeCredentials,
    ) -> Result<Exchange> {
        let mode = credentials.mode();
        let endpoints = surface.resolve_all(surface.token_paths(mode))?;
        if endpoints.is_empty() {
            return Err(Error::NoCandidates(format!("{mode} exchange")));
        }

        let mut best: Option<Error> = None;
        for endpoint in endpoints {
            match self.attempt(&endpoint, credentials).await {
                Ok(token) => {
                    info!(
                        "{mode} exchange for '{}' succeeded at {endpoint}",
                        credentials.principal()
                    );
                    return Ok(Exchange { token, endpoint });
                }
                Err(e) => {
                    debug!("{mode} exchange at {endpoint} failed: {e}");
                    if best
                        .as_ref()
                        .is_none_or(|b| e.specificity() > b.specificity())
                    {
                        best = Some(e);
                    }
                }
            }
        }

        let err = best.unwrap_or_else(|| Error::NoCandidates(format!("{mode} exchange")));
        warn!(
            "{mode} exchange for '{}' failed on every candidate: {err}",
            credentials.principal()
        );
        Err(err)
    }

    /// Best-effort remote invalidation of a token.
    ///
    /// # Errors
    ///
    /// Returns the last failure if no invalidation endpoint accepted the token.
    pub async fn invalidate(&self, surface: &ApiSurface, token: &Token) -> Result<()> {
        let mut last = Error::NoCandidates("token invalidation".into());
        for endpoint in surface.resolve_all(&surface.invalidate_paths)? {
            let sent = self
                .http_client
                .post(endpoint.clone())
                .header(reqwest::header::AUTHORIZATION, token.authorization_header())
                .send()
                .await;
            match sent {
                Ok(response) => match http::ensure_success(response).await {
                    Ok(_) => {
                        debug!("Invalidated token at {endpoint}");
                        return Ok(());
                    }
                    Err(e) => last = e,
                },
                Err(e) => last = http::network_error(&e, endpoint.as_str()),
            }
        }
        Err(last)
    }

    async fn attempt(&self, endpoint: &Url, credentials: &ExchangeCredentials) -> Result<Token> {
        let request = self.build_request(endpoint, credentials);
        let response = request
            .send()
            .await
            .map_err(|e| http::network_error(&e, endpoint.as_str()))?;
        let response = http::ensure_success(response).await?;

        let body = response
            .text()
            .await
            .map_err(|e| http::network_error(&e, endpoint.as_str()))?;
        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|_| Error::InvalidResponse(format!("unrecognized token body from {endpoint}")))?;
        Token::from_response(parsed)
    }

    fn build_request(&self, endpoint: &Url, credentials: &ExchangeCredentials) -> RequestBuilder {
        let builder = self
            .http_client
            .post(endpoint.clone())
            .header(reqwest::header::ACCEPT, "application/json");
        match credentials {
            ExchangeCredentials::ClientCredentials {
                client_id,
                client_secret,
            } => client_credentials::request(builder, client_id, client_secret),
            ExchangeCredentials::Basic { username, password } => {
                basic::request(builder, username, password)
            }
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
    use crate::credentials::ExchangeMode;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn exchanger() -> TokenExchanger {
        TokenExchanger::new(Duration::from_secs(5)).unwrap()
    }

    fn surface(base: &str) -> ApiSurface {
        ApiSurface::jamf(base).unwrap()
    }

    #[tokio::test]
    async fn test_second_candidate_succeeds_after_404() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/oauth/token"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/oauth/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=x"))
            .and(body_string_contains("client_secret=y"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-1",
                "token_type": "Bearer",
                "expires_in": 1199
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credentials = ExchangeCredentials::client_credentials("x", "y");
        let exchange = exchanger()
            .exchange(&surface(&server.uri()), &credentials)
            .await
            .unwrap();

        assert_eq!(exchange.token.access_token, "tok-1");
        assert!(exchange.endpoint.path().ends_with("/api/v1/oauth/token"));
    }

    #[tokio::test]
    async fn test_basic_exchange_uses_authorization_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/token"))
            // base64("admin:pw")
            .and(header("authorization", "Basic YWRtaW46cHc="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "tok-basic",
                "expires": "2099-01-01T00:00:00Z"
            })))
            .mount(&server)
            .await;

        let credentials = ExchangeCredentials::basic("admin", "pw");
        let exchange = exchanger()
            .exchange(&surface(&server.uri()), &credentials)
            .await
            .unwrap();
        assert_eq!(exchange.token.access_token, "tok-basic");
    }

    #[tokio::test]
    async fn test_most_specific_error_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "invalid_client",
                "error_description": "Client authentication failed"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/oauth/token"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let credentials = ExchangeCredentials::client_credentials("x", "wrong");
        let err = exchanger()
            .exchange(&surface(&server.uri()), &credentials)
            .await
            .unwrap_err();

        match err {
            Error::Rejected { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message.as_deref(), Some("Client authentication failed"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejection_preferred_over_network_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/token"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        // Second candidate points at a closed port.
        let dead = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}/token", listener.local_addr().unwrap())
        };
        let surface = surface(&server.uri())
            .with_token_paths(ExchangeMode::Basic, vec!["api/v1/auth/token".into(), dead]);

        let err = exchanger()
            .exchange(&surface, &ExchangeCredentials::basic("admin", "pw"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(403));
    }

    #[tokio::test]
    async fn test_unrecognized_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let err = exchanger()
            .exchange(
                &surface(&server.uri()),
                &ExchangeCredentials::client_credentials("x", "y"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_no_candidates() {
        let surface = ApiSurface::new("Empty", "https://acme.example.com").unwrap();
        let err = exchanger()
            .exchange(&surface, &ExchangeCredentials::basic("a", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoCandidates(_)));
    }

    #[tokio::test]
    async fn test_invalidate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/invalidate-token"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let token = Token::new("tok", chrono::Utc::now() + chrono::Duration::hours(1));
        exchanger()
            .invalidate(&surface(&server.uri()), &token)
            .await
            .unwrap();
    }
}
