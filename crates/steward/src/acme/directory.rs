//! ACME account operations against a directory
//!
//! Only the account endpoints are spoken here: `newNonce`, `newAccount` and
//! the account URL itself. Orders are delegated to the issuer module.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::account::{AccountIdentity, AccountKey, Registration};
use super::error::{AcmeError, Problem};
use super::jws::{self, Signer};
use super::{issuer, AcmeClient, IssuedCertificate, ObtainRequest};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const REPLAY_NONCE: &str = "replay-nonce";
const JOSE_JSON: &str = "application/jose+json";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Directory {
    new_nonce: String,
    new_account: String,
}

struct AcmeResponse {
    location: Option<String>,
    body: Value,
}

/// ACME client bound to one directory URL
pub struct DirectoryClient {
    http: Client,
    directory_url: String,
    directory: Mutex<Option<Directory>>,
}

impl DirectoryClient {
    pub fn new(directory_url: impl Into<String>) -> Result<Self, AcmeError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AcmeError::Http(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            directory_url: directory_url.into(),
            directory: Mutex::new(None),
        })
    }

    pub fn directory_url(&self) -> &str {
        &self.directory_url
    }

    async fn directory(&self) -> Result<Directory, AcmeError> {
        let cached = self.directory.lock().clone();
        if let Some(directory) = cached {
            return Ok(directory);
        }

        let unusable = |message: String| AcmeError::Directory {
            url: self.directory_url.clone(),
            message,
        };

        let response = self.http.get(&self.directory_url).send().await?;
        if !response.status().is_success() {
            return Err(unusable(format!("HTTP {}", response.status())));
        }
        let directory: Directory = response
            .json()
            .await
            .map_err(|e| unusable(e.to_string()))?;

        debug!(url = %self.directory_url, "Fetched ACME directory");
        *self.directory.lock() = Some(directory.clone());
        Ok(directory)
    }

    async fn nonce(&self, directory: &Directory) -> Result<String, AcmeError> {
        let response = self.http.head(&directory.new_nonce).send().await?;
        response
            .headers()
            .get(REPLAY_NONCE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| AcmeError::Directory {
                url: directory.new_nonce.clone(),
                message: "response carried no Replay-Nonce".to_string(),
            })
    }

    /// Signed POST; retried once when the server rejects the nonce
    async fn post(
        &self,
        key: &AccountKey,
        signer: Signer<'_>,
        url: &str,
        payload: Option<&Value>,
    ) -> Result<AcmeResponse, AcmeError> {
        let directory = self.directory().await?;
        let mut retried = false;

        loop {
            let nonce = self.nonce(&directory).await?;
            let body = jws::sign(key, signer, &nonce, url, payload)?;

            let response = self
                .http
                .post(url)
                .header(CONTENT_TYPE, JOSE_JSON)
                .body(body.to_string())
                .send()
                .await?;

            let status = response.status();
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            let bytes = response.bytes().await?;

            if status.is_success() {
                let body = if bytes.is_empty() {
                    Value::Null
                } else {
                    serde_json::from_slice(&bytes)
                        .map_err(|e| AcmeError::Http(format!("invalid JSON from '{}': {}", url, e)))?
                };
                return Ok(AcmeResponse { location, body });
            }

            let problem = serde_json::from_slice::<Problem>(&bytes)
                .ok()
                .filter(|problem| !problem.kind.is_empty());
            let problem = match problem {
                Some(problem) if status.is_client_error() => problem,
                _ => {
                    warn!(url = %url, status = %status, "ACME server returned no problem document");
                    return Err(AcmeError::Unavailable {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }
            };

            if problem.is_bad_nonce() && !retried {
                debug!(url = %url, "Nonce rejected, retrying once");
                retried = true;
                continue;
            }
            if problem.is_account_does_not_exist() {
                return Err(AcmeError::AccountDoesNotExist);
            }
            return Err(AcmeError::Rejected {
                url: url.to_string(),
                status: status.as_u16(),
                problem,
            });
        }
    }

    async fn new_account(
        &self,
        identity: &AccountIdentity,
        payload: Value,
    ) -> Result<Registration, AcmeError> {
        let directory = self.directory().await?;
        let response = self
            .post(&identity.key, Signer::Jwk, &directory.new_account, Some(&payload))
            .await?;

        let uri = response.location.ok_or_else(|| {
            AcmeError::Http(format!(
                "response from '{}' has no Location header",
                directory.new_account
            ))
        })?;

        Ok(Registration {
            body: response.body,
            uri,
        })
    }
}

#[async_trait]
impl AcmeClient for DirectoryClient {
    async fn query_registration(
        &self,
        identity: &AccountIdentity,
    ) -> Result<Registration, AcmeError> {
        let registration = identity
            .registration
            .as_ref()
            .ok_or(AcmeError::NoRegistration)?;

        let response = self
            .post(
                &identity.key,
                Signer::KeyId(&registration.uri),
                &registration.uri,
                None,
            )
            .await?;

        let status = response
            .body
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if status != "valid" {
            return Err(AcmeError::AccountNotValid {
                uri: registration.uri.clone(),
                status: status.to_string(),
            });
        }

        Ok(Registration {
            body: response.body,
            uri: registration.uri.clone(),
        })
    }

    async fn resolve_registration_by_key(
        &self,
        identity: &AccountIdentity,
    ) -> Result<Registration, AcmeError> {
        let registration = self
            .new_account(identity, json!({ "onlyReturnExisting": true }))
            .await?;
        info!(uri = %registration.uri, "Resolved ACME account by key");
        Ok(registration)
    }

    async fn register(&self, identity: &AccountIdentity) -> Result<Registration, AcmeError> {
        let registration = self
            .new_account(
                identity,
                json!({
                    "termsOfServiceAgreed": true,
                    "contact": [format!("mailto:{}", identity.email)],
                }),
            )
            .await?;
        info!(uri = %registration.uri, email = %identity.email, "Registered ACME account");
        Ok(registration)
    }

    async fn obtain_certificate(
        &self,
        identity: &AccountIdentity,
        request: &ObtainRequest,
    ) -> Result<IssuedCertificate, AcmeError> {
        issuer::obtain(&self.directory_url, identity, request).await
    }
}

impl std::fmt::Debug for DirectoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryClient")
            .field("directory_url", &self.directory_url)
            .finish()
    }
}
