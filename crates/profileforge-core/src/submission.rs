//! Profile submission.
//!
//! A submission validates the document, encodes it and tries to create the
//! named resource. If the server reports the resource already exists (409),
//! the same body is sent again as an update.

use profileforge_auth::http;
use profileforge_profile::{Document, validate};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::Session;
use crate::config::Settings;
use crate::{Error, Result};

/// MIME type of configuration profiles.
pub const PROFILE_CONTENT_TYPE: &str = "application/x-apple-aspen-config";

/// What the server did with a submitted profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A new profile was created.
    Created,
    /// An existing profile with the same name was replaced.
    Updated,
}

impl std::fmt::Display for SubmitOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
        }
    }
}

/// Sends documents to a management server.
#[derive(Debug, Clone)]
pub struct Submitter {
    http_client: Client,
    settings: Settings,
}

impl Submitter {
    /// Creates a submitter using the submission timeout from `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be built.
    pub fn new(settings: &Settings) -> Result<Self> {
        let http_client = http::client(settings.submission_timeout())
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self {
            http_client,
            settings: settings.clone(),
        })
    }

    /// Validates and submits a document.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if the document is invalid; nothing is sent
    /// - [`Error::SessionExpired`] if the token is expired or the server
    ///   answers 401
    /// - [`Error::Submission`] for any other rejection
    /// - [`Error::Transport`] if the server did not respond
    pub async fn submit(&self, document: &Document, session: &Session) -> Result<SubmitOutcome> {
        let report = validate(document);
        if !report.is_valid() {
            warn!(
                "Refusing to submit '{}': {} validation error(s)",
                document.name,
                report.errors.len()
            );
            return Err(Error::validation(report));
        }
        if session.is_expired() {
            return Err(Error::SessionExpired);
        }

        let encoding = self.settings.export_encoding;
        let body = document.to_bytes(encoding)?;
        let url = self.settings.resource_url(session.server(), &document.name)?;
        debug!(
            "Submitting '{}' ({} bytes, {encoding:?}) to {url}",
            document.name,
            body.len()
        );

        match self.send(Method::POST, &url, session, body.clone()).await {
            Ok(()) => {
                info!("Created profile '{}'", document.name);
                Ok(SubmitOutcome::Created)
            }
            Err(Error::Submission { status: 409, .. }) => {
                debug!("Profile '{}' exists, updating", document.name);
                self.send(Method::PUT, &url, session, body).await?;
                info!("Updated profile '{}'", document.name);
                Ok(SubmitOutcome::Updated)
            }
            Err(e) => Err(e),
        }
    }

    async fn send(
        &self,
        method: Method,
        url: &Url,
        session: &Session,
        body: Vec<u8>,
    ) -> Result<()> {
        let response = self
            .http_client
            .request(method, url.clone())
            .header(AUTHORIZATION, session.authorization_header())
            .header(CONTENT_TYPE, PROFILE_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Transport(http::network_error(&e, url.as_str())))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(Error::SessionExpired);
        }
        match http::ensure_success(response).await {
            Ok(_) => Ok(()),
            Err(profileforge_auth::Error::Rejected { status, message }) => {
                Err(Error::Submission { status, message })
            }
            Err(e) => Err(Error::Transport(e)),
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
    use crate::account::AccountId;
    use chrono::{Duration, Utc};
    use profileforge_auth::Token;
    use profileforge_profile::{ConfigUnit, ProfileComposer, SettingValue};
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RESOURCE: &str = "/JSSResource/osxconfigurationprofiles/name/Acme%20Wi-Fi";

    fn document() -> Document {
        let mut composer = ProfileComposer::new("Acme Wi-Fi", "com.acme.wifi")
            .with_organization("Acme")
            .with_description("Office network");
        composer.add_unit(
            ConfigUnit::new("com.apple.wifi.managed", "Wi-Fi")
                .with_setting("SSID_STR", SettingValue::String("acme".into())),
        );
        composer.build()
    }

    fn session(server: &MockServer) -> Session {
        Session::new(
            AccountId::new(1),
            Url::parse(&server.uri()).unwrap(),
            Token::new("tok", Utc::now() + Duration::minutes(20)),
        )
    }

    fn submitter() -> Submitter {
        Submitter::new(&Settings::default()).unwrap()
    }

    #[tokio::test]
    async fn test_create() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(RESOURCE))
            .and(header("authorization", "Bearer tok"))
            .and(header("content-type", PROFILE_CONTENT_TYPE))
            .and(body_string_contains("com.acme.wifi"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = submitter()
            .submit(&document(), &session(&server))
            .await
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::Created);
    }

    #[tokio::test]
    async fn test_conflict_falls_back_to_update() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(RESOURCE))
            .respond_with(ResponseTemplate::new(409))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(RESOURCE))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = submitter()
            .submit(&document(), &session(&server))
            .await
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::Updated);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method.as_str(), "POST");
        assert_eq!(requests[1].method.as_str(), "PUT");
        assert_eq!(requests[0].body, requests[1].body);
        assert_eq!(
            requests[1].headers.get("content-type").unwrap(),
            PROFILE_CONTENT_TYPE
        );
    }

    #[tokio::test]
    async fn test_invalid_document_is_never_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let empty = ProfileComposer::new("Empty", "com.acme.empty").build();
        let err = submitter()
            .submit(&empty, &session(&server))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn test_unauthorized_is_session_expired() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = submitter()
            .submit(&document(), &session(&server))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionExpired));
    }

    #[tokio::test]
    async fn test_expired_session_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;
        let expired = Session::new(
            AccountId::new(1),
            Url::parse(&server.uri()).unwrap(),
            Token::new("tok", Utc::now() - Duration::minutes(1)),
        );

        let err = submitter().submit(&document(), &expired).await.unwrap_err();
        assert!(matches!(err, Error::SessionExpired));
    }

    #[tokio::test]
    async fn test_server_rejection_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "Bad payload"})),
            )
            .mount(&server)
            .await;

        let err = submitter()
            .submit(&document(), &session(&server))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Submission { status: 400, message: Some(ref m) } if m == "Bad payload"
        ));
    }

    #[tokio::test]
    async fn test_no_response_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let session = Session::new(
            AccountId::new(1),
            Url::parse(&format!("http://{addr}")).unwrap(),
            Token::new("tok", Utc::now() + Duration::minutes(20)),
        );

        let err = submitter().submit(&document(), &session).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
