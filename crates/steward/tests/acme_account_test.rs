//! Account operations of the directory client against a mock ACME server

mod common;

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use certsteward::acme::{AccountIdentity, AccountKey, Registration};
use certsteward::{
    AccountError, AccountReconciler, AcmeClient, AcmeError, DirectoryClient, MemoryStore,
    SecretStore,
};

const EMAIL: &str = "ops@example.com";

async fn acme_server() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/directory"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "newNonce": format!("{}/new-nonce", server.uri()),
            "newAccount": format!("{}/new-acct", server.uri()),
            "newOrder": format!("{}/new-order", server.uri()),
        })))
        .mount(&server)
        .await;

    Mock::given(method("HEAD"))
        .and(path("/new-nonce"))
        .respond_with(ResponseTemplate::new(200).insert_header("Replay-Nonce", "nonce-abc"))
        .mount(&server)
        .await;

    server
}

fn client(server: &MockServer) -> DirectoryClient {
    DirectoryClient::new(format!("{}/directory", server.uri())).unwrap()
}

fn identity() -> AccountIdentity {
    AccountIdentity::unregistered(EMAIL, AccountKey::generate().unwrap())
}

fn decode_segment(body: &Value, field: &str) -> Value {
    let raw = URL_SAFE_NO_PAD
        .decode(body[field].as_str().unwrap())
        .unwrap();
    if raw.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&raw).unwrap()
    }
}

async fn signed_posts(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "POST")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

fn problem(kind: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({
        "type": format!("urn:ietf:params:acme:error:{}", kind),
        "detail": "test problem",
    }))
}

#[tokio::test]
async fn test_register_agrees_to_terms() {
    let server = acme_server().await;
    Mock::given(method("POST"))
        .and(path("/new-acct"))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("Location", format!("{}/acct/1", server.uri()).as_str())
                .set_body_json(json!({ "status": "valid" })),
        )
        .mount(&server)
        .await;

    let identity = identity();
    let registration = client(&server).register(&identity).await.unwrap();
    assert_eq!(registration.uri, format!("{}/acct/1", server.uri()));
    assert_eq!(registration.body["status"], "valid");

    let posts = signed_posts(&server).await;
    assert_eq!(posts.len(), 1);

    let protected = decode_segment(&posts[0], "protected");
    assert_eq!(protected["alg"], "ES256");
    assert_eq!(protected["nonce"], "nonce-abc");
    assert_eq!(protected["url"], format!("{}/new-acct", server.uri()));
    assert_eq!(protected["jwk"], identity.key.jwk());

    let payload = decode_segment(&posts[0], "payload");
    assert_eq!(payload["termsOfServiceAgreed"], true);
    assert_eq!(payload["contact"], json!(["mailto:ops@example.com"]));
}

#[tokio::test]
async fn test_resolve_only_returns_existing() {
    let server = acme_server().await;
    Mock::given(method("POST"))
        .and(path("/new-acct"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Location", format!("{}/acct/5", server.uri()).as_str())
                .set_body_json(json!({ "status": "valid" })),
        )
        .mount(&server)
        .await;

    let registration = client(&server)
        .resolve_registration_by_key(&identity())
        .await
        .unwrap();
    assert_eq!(registration.uri, format!("{}/acct/5", server.uri()));

    let payload = decode_segment(&signed_posts(&server).await[0], "payload");
    assert_eq!(payload, json!({ "onlyReturnExisting": true }));
}

#[tokio::test]
async fn test_resolve_unknown_key() {
    let server = acme_server().await;
    Mock::given(method("POST"))
        .and(path("/new-acct"))
        .respond_with(problem("accountDoesNotExist"))
        .mount(&server)
        .await;

    let err = client(&server)
        .resolve_registration_by_key(&identity())
        .await
        .unwrap_err();
    assert!(matches!(err, AcmeError::AccountDoesNotExist));
    assert!(err.is_rejection());
}

#[tokio::test]
async fn test_bad_nonce_is_retried_once() {
    let server = acme_server().await;
    Mock::given(method("POST"))
        .and(path("/new-acct"))
        .respond_with(problem("badNonce"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/new-acct"))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("Location", format!("{}/acct/2", server.uri()).as_str())
                .set_body_json(json!({ "status": "valid" })),
        )
        .mount(&server)
        .await;

    let registration = client(&server).register(&identity()).await.unwrap();
    assert_eq!(registration.uri, format!("{}/acct/2", server.uri()));
    assert_eq!(signed_posts(&server).await.len(), 2);
}

#[tokio::test]
async fn test_query_uses_account_url_as_key_id() {
    let server = acme_server().await;
    Mock::given(method("POST"))
        .and(path("/acct/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "valid" })))
        .mount(&server)
        .await;

    let uri = format!("{}/acct/3", server.uri());
    let mut identity = identity();
    identity.registration = Some(Registration {
        body: Value::Null,
        uri: uri.clone(),
    });

    let registration = client(&server)
        .query_registration(&identity)
        .await
        .unwrap();
    assert_eq!(registration.uri, uri);

    let post = &signed_posts(&server).await[0];
    let protected = decode_segment(post, "protected");
    assert_eq!(protected["kid"], uri.as_str());
    assert!(protected.get("jwk").is_none());
    assert_eq!(post["payload"], "");
}

#[tokio::test]
async fn test_query_deactivated_account() {
    let server = acme_server().await;
    Mock::given(method("POST"))
        .and(path("/acct/4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "deactivated" })))
        .mount(&server)
        .await;

    let mut identity = identity();
    identity.registration = Some(Registration {
        body: Value::Null,
        uri: format!("{}/acct/4", server.uri()),
    });

    let err = client(&server)
        .query_registration(&identity)
        .await
        .unwrap_err();
    match err {
        AcmeError::AccountNotValid { status, .. } => assert_eq!(status, "deactivated"),
        other => panic!("expected AccountNotValid, got {:?}", other),
    }
}

#[tokio::test]
async fn test_query_without_registration() {
    let server = acme_server().await;
    let err = client(&server)
        .query_registration(&identity())
        .await
        .unwrap_err();
    assert!(matches!(err, AcmeError::NoRegistration));
}

#[tokio::test]
async fn test_unreachable_directory_is_not_a_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/directory"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client(&server).register(&identity()).await.unwrap_err();
    assert!(matches!(err, AcmeError::Directory { .. }));
    assert!(!err.is_rejection());
}

fn outage() -> ResponseTemplate {
    ResponseTemplate::new(503).set_body_string("<html><body>Service Unavailable</body></html>")
}

#[tokio::test]
async fn test_server_outage_is_not_a_rejection() {
    let server = acme_server().await;
    Mock::given(method("POST"))
        .and(path("/new-acct"))
        .respond_with(outage())
        .mount(&server)
        .await;

    let err = client(&server)
        .resolve_registration_by_key(&identity())
        .await
        .unwrap_err();
    match &err {
        AcmeError::Unavailable { status, .. } => assert_eq!(*status, 503),
        other => panic!("expected Unavailable, got {:?}", other),
    }
    assert!(!err.is_rejection());
}

#[tokio::test]
async fn test_client_error_without_problem_document() {
    let server = acme_server().await;
    Mock::given(method("POST"))
        .and(path("/new-acct"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let err = client(&server).register(&identity()).await.unwrap_err();
    assert!(matches!(err, AcmeError::Unavailable { status: 404, .. }));
    assert!(!err.is_rejection());
}

#[tokio::test]
async fn test_outage_leaves_stored_account_untouched() {
    let server = acme_server().await;
    let account_uri = format!("{}/acct/1", server.uri());
    Mock::given(method("POST"))
        .and(path("/acct/1"))
        .respond_with(outage())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/new-acct"))
        .respond_with(outage())
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/new-acct"))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("Location", format!("{}/acct/2", server.uri()).as_str())
                .set_body_json(json!({ "status": "valid" })),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    common::seed_key(&store);
    common::seed_account(&store, EMAIL, Some(&account_uri));

    let secrets: Arc<dyn SecretStore> = store.clone();
    let acme: Arc<dyn AcmeClient> = Arc::new(client(&server));
    let err = AccountReconciler::new(secrets, acme, EMAIL, true)
        .ensure_account()
        .await
        .unwrap_err();

    assert!(matches!(err, AccountError::Acme(AcmeError::Unavailable { .. })));
    assert_eq!(store.write_count(), 0);
    let record = common::stored_account(&store);
    assert_eq!(record.registration.unwrap().uri, account_uri);
}
