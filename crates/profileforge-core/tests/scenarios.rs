//! End-to-end flows against a mock management server.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use profileforge_auth::ExchangeCredentials;
use profileforge_core::{
    Account, AccountRepository, AuthEngine, ConnectionState, CredentialStore, MemoryBackend,
    Settings, SubmitOutcome, Submitter, Vendor,
};
use profileforge_profile::{
    PrivacyAuthorization, PrivacyService, ProfileComposer, ValidationPass, validate,
};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RESOURCE: &str = "/JSSResource/osxconfigurationprofiles/name/Acme%20Privacy";

async fn engine_for(server: &MockServer) -> (AuthEngine, profileforge_core::AccountId) {
    let repo = AccountRepository::in_memory().await.unwrap();
    let store = Arc::new(CredentialStore::new(repo, Arc::new(MemoryBackend::new())));
    let mut account = Account::new("Acme", Vendor::Jamf, server.uri());
    let id = store.store(&mut account).await.unwrap();
    (AuthEngine::new(store, Settings::default()).unwrap(), id)
}

async fn mount_auth(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/ping"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/oauth/token"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/oauth/token"))
        .and(body_string_contains("client_id=x"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "acme-token",
            "token_type": "Bearer",
            "expires_in": 1199
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn privacy_profile() -> ProfileComposer {
    let mut composer = ProfileComposer::new("Acme Privacy", "com.acme.privacy")
        .with_organization("Acme")
        .with_description("Camera access for conferencing");
    composer.set_privacy_authorization(
        PrivacyAuthorization::new(PrivacyService::Camera, "us.zoom.xos", true)
            .with_code_requirement("identifier \"us.zoom.xos\" and anchor apple generic"),
    );
    composer
}

#[tokio::test]
async fn acme_connects_composes_and_creates() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("POST"))
        .and(path(RESOURCE))
        .and(body_string_contains("com.apple.TCC.configuration-profile-policy"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    let (engine, id) = engine_for(&server).await;

    let credentials = ExchangeCredentials::client_credentials("x", "y");
    let session = engine.connect(id, &credentials).await.unwrap();
    assert_eq!(engine.state(id), ConnectionState::Connected);

    let resumed = engine.session(id).await.unwrap();
    assert_eq!(resumed.token(), session.token());

    let document = privacy_profile().build();
    let report = validate(&document);
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert!(
        report
            .compliance_issues
            .iter()
            .all(|issue| issue.pass == ValidationPass::Compliance)
    );

    let submitter = Submitter::new(&Settings::default()).unwrap();
    let outcome = submitter.submit(&document, &session).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Created);
}

#[tokio::test]
async fn resubmitting_the_same_name_updates() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("POST"))
        .and(path(RESOURCE))
        .respond_with(ResponseTemplate::new(201))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
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
    let (engine, id) = engine_for(&server).await;
    let session = engine
        .connect(id, &ExchangeCredentials::client_credentials("x", "y"))
        .await
        .unwrap();

    let document = privacy_profile().build();
    let submitter = Submitter::new(&Settings::default()).unwrap();

    let first = submitter.submit(&document, &session).await.unwrap();
    let second = submitter.submit(&document, &session).await.unwrap();
    assert_eq!(first, SubmitOutcome::Created);
    assert_eq!(second, SubmitOutcome::Updated);

    let uploads: Vec<_> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == RESOURCE)
        .collect();
    let methods: Vec<_> = uploads.iter().map(|r| r.method.as_str()).collect();
    assert_eq!(methods, ["POST", "POST", "PUT"]);
    assert!(uploads.iter().all(|r| r.body == uploads[0].body));
}

#[tokio::test]
async fn logout_forgets_the_session() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/invalidate-token"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let (engine, id) = engine_for(&server).await;
    engine
        .connect(id, &ExchangeCredentials::client_credentials("x", "y"))
        .await
        .unwrap();

    engine.logout(id).await.unwrap();
    assert!(engine.session(id).await.is_none());
    assert_eq!(engine.state(id), ConnectionState::Disconnected);
}
