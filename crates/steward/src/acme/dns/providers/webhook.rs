//! Generic webhook DNS provider
//!
//! # Webhook API
//!
//! ## Create Record
//! ```text
//! POST {url}/records
//! Content-Type: application/json
//!
//! {
//!   "domain": "example.com",
//!   "record_name": "_acme-challenge.example.com",
//!   "record_type": "TXT",
//!   "record_value": "challenge-value",
//!   "ttl": 60
//! }
//!
//! Response:
//! {
//!   "record_id": "unique-id"
//! }
//! ```
//!
//! ## Delete Record
//! ```text
//! DELETE {url}/records/{record_id}?domain={domain}
//!
//! Response: 200 OK or 204 No Content
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::acme::dns::provider::{DnsProvider, DnsProviderError, DnsResult, TxtRecord, CHALLENGE_TTL};

/// Webhook DNS provider for custom integrations
pub struct WebhookProvider {
    client: Client,
    base_url: String,
    auth_header: Option<String>,
    credentials: Option<String>,
}

impl WebhookProvider {
    /// Create a new webhook DNS provider
    ///
    /// With an `auth_header`, the credentials are sent verbatim in that
    /// header; otherwise they are sent as a bearer token.
    pub fn new(
        base_url: String,
        auth_header: Option<String>,
        credentials: Option<String>,
        timeout: Duration,
    ) -> DnsResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            DnsProviderError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_header,
            credentials,
        })
    }

    fn add_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.auth_header, &self.credentials) {
            (Some(header), Some(creds)) => request.header(header.as_str(), creds.as_str()),
            (None, Some(creds)) => request.bearer_auth(creds),
            _ => request,
        }
    }

    fn request_error(e: reqwest::Error) -> DnsProviderError {
        DnsProviderError::ApiRequest(format!("Webhook request failed: {}", e))
    }
}

#[async_trait]
impl DnsProvider for WebhookProvider {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn create_txt_record(&self, record: &TxtRecord) -> DnsResult<String> {
        debug!(
            domain = %record.domain,
            record = %record.fqdn,
            url = %self.base_url,
            "Creating TXT record via webhook"
        );

        let body = CreateRecordRequest {
            domain: &record.domain,
            record_name: &record.fqdn,
            record_type: "TXT",
            record_value: &record.value,
            ttl: CHALLENGE_TTL,
        };

        let response = self
            .add_auth(self.client.post(format!("{}/records", self.base_url)).json(&body))
            .send()
            .await
            .map_err(Self::request_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DnsProviderError::Authentication(
                "Webhook authentication failed".to_string(),
            ));
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DnsProviderError::RecordCreation {
                fqdn: record.fqdn.clone(),
                message: format!("Webhook returned HTTP {} - {}", status, text),
            });
        }

        let created: CreateRecordResponse =
            response
                .json()
                .await
                .map_err(|e| DnsProviderError::RecordCreation {
                    fqdn: record.fqdn.clone(),
                    message: format!("Failed to parse webhook response: {}", e),
                })?;

        debug!(record_id = %created.record_id, "TXT record created via webhook");
        Ok(created.record_id)
    }

    async fn delete_txt_record(&self, record: &TxtRecord, record_id: &str) -> DnsResult<()> {
        debug!(
            domain = %record.domain,
            record_id = %record_id,
            "Deleting TXT record via webhook"
        );

        let request = self
            .client
            .delete(format!("{}/records/{}", self.base_url, record_id))
            .query(&[("domain", record.domain.as_str())]);

        let response = self
            .add_auth(request)
            .send()
            .await
            .map_err(Self::request_error)?;

        // Already gone
        if response.status() == StatusCode::NOT_FOUND {
            debug!(record_id = %record_id, "Record already deleted");
            return Ok(());
        }

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(DnsProviderError::RecordDeletion {
                fqdn: record.fqdn.clone(),
                message: format!("Webhook returned HTTP {} - {}", status, text),
            });
        }

        Ok(())
    }
}

impl std::fmt::Debug for WebhookProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookProvider")
            .field("base_url", &self.base_url)
            .field("auth_header", &self.auth_header)
            .field("has_credentials", &self.credentials.is_some())
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct CreateRecordRequest<'a> {
    domain: &'a str,
    record_name: &'a str,
    record_type: &'a str,
    record_value: &'a str,
    ttl: u32,
}

#[derive(Debug, Deserialize)]
struct CreateRecordResponse {
    record_id: String,
}
