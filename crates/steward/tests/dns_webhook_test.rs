//! Webhook DNS provider against a mock endpoint

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use certsteward::acme::dns::{DnsProvider, DnsProviderError, TxtRecord, WebhookProvider};

fn provider(server: &MockServer, auth_header: Option<&str>) -> WebhookProvider {
    WebhookProvider::new(
        server.uri(),
        auth_header.map(str::to_string),
        Some("s3cret".to_string()),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_create_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/records"))
        .and(header("Authorization", "Bearer s3cret"))
        .and(body_json(json!({
            "domain": "example.com",
            "record_name": "_acme-challenge.example.com",
            "record_type": "TXT",
            "record_value": "value-1",
            "ttl": 60,
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "record_id": "rec-42" })))
        .expect(1)
        .mount(&server)
        .await;

    let record = TxtRecord::for_domain("*.example.com", "value-1");
    let id = provider(&server, None)
        .create_txt_record(&record)
        .await
        .unwrap();
    assert_eq!(id, "rec-42");
}

#[tokio::test]
async fn test_custom_auth_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/records"))
        .and(header("X-Api-Key", "s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "record_id": "r" })))
        .expect(1)
        .mount(&server)
        .await;

    let record = TxtRecord::for_domain("example.com", "v");
    provider(&server, Some("X-Api-Key"))
        .create_txt_record(&record)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/records"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let record = TxtRecord::for_domain("example.com", "v");
    let err = provider(&server, None)
        .create_txt_record(&record)
        .await
        .unwrap_err();
    assert!(matches!(err, DnsProviderError::Authentication(_)));
}

#[tokio::test]
async fn test_delete_record() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/records/rec-42"))
        .and(query_param("domain", "example.com"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let record = TxtRecord::for_domain("example.com", "v");
    provider(&server, None)
        .delete_txt_record(&record, "rec-42")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_missing_record_is_ok() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let record = TxtRecord::for_domain("example.com", "v");
    assert!(provider(&server, None)
        .delete_txt_record(&record, "gone")
        .await
        .is_ok());
}

#[tokio::test]
async fn test_delete_failure() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let record = TxtRecord::for_domain("example.com", "v");
    let err = provider(&server, None)
        .delete_txt_record(&record, "rec-1")
        .await
        .unwrap_err();
    match err {
        DnsProviderError::RecordDeletion { fqdn, message } => {
            assert_eq!(fqdn, "_acme-challenge.example.com");
            assert!(message.contains("boom"));
        }
        other => panic!("expected RecordDeletion, got {:?}", other),
    }
}
