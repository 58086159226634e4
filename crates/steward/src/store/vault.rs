//! HashiCorp Vault KV v2 secret store
//!
//! Records live at `<address>/v1/<prefix><key>`, where the prefix carries the
//! mount and the KV v2 `data/` segment, e.g. `secret/data/certsteward/`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use certsteward_common::StoreKey;
use certsteward_config::VaultConfig;

use super::{FieldMap, SecretStore, StoreError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TOKEN_HEADER: &str = "X-Vault-Token";

/// Vault KV v2 client holding an authenticated token
pub struct VaultStore {
    client: Client,
    address: String,
    prefix: String,
    token: String,
}

#[derive(Deserialize)]
struct LoginResponse {
    auth: Option<LoginAuth>,
}

#[derive(Deserialize)]
struct LoginAuth {
    client_token: String,
}

#[derive(Deserialize)]
struct ReadResponse {
    #[serde(default)]
    data: Option<ReadData>,
}

#[derive(Deserialize)]
struct ReadData {
    #[serde(default)]
    data: Value,
}

impl VaultStore {
    /// Authenticate against Vault
    ///
    /// Development deployments use the configured root token; everything
    /// else logs in through AppRole.
    pub async fn login(config: &VaultConfig, dev: bool) -> Result<Self, StoreError> {
        let mut store = Self::with_token(&config.address, &config.kv_storage_path, "")?;

        if dev {
            debug!("Using Vault dev root token");
            store.token = config.dev_root_token.clone();
        } else {
            store.token = store
                .approle_login(&config.approle_role_id, &config.approle_secret_id)
                .await?;
            info!(address = %store.address, "Authenticated to Vault with AppRole");
        }

        Ok(store)
    }

    /// Build a store around an existing token
    pub fn with_token(address: &str, prefix: &str, token: &str) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Transport {
                key: String::new(),
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            address: address.trim_end_matches('/').to_string(),
            prefix: prefix.trim_start_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn approle_login(&self, role_id: &str, secret_id: &str) -> Result<String, StoreError> {
        let response = self
            .client
            .post(format!("{}/v1/auth/approle/login", self.address))
            .json(&json!({ "role_id": role_id, "secret_id": secret_id }))
            .send()
            .await
            .map_err(|e| StoreError::Auth(format!("login request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(StoreError::Auth(format!(
                "login returned HTTP {}",
                response.status()
            )));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Auth(format!("unreadable login response: {}", e)))?;

        body.auth
            .map(|auth| auth.client_token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| StoreError::Auth("login response carried no client token".to_string()))
    }

    fn full_path(&self, key: &StoreKey) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn url(&self, key: &StoreKey) -> String {
        format!("{}/v1/{}", self.address, self.full_path(key))
    }

    fn transport_error(&self, key: &StoreKey, e: reqwest::Error) -> StoreError {
        StoreError::Transport {
            key: self.full_path(key),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl SecretStore for VaultStore {
    async fn read(&self, key: &StoreKey) -> Result<Option<FieldMap>, StoreError> {
        info!(path = %self.full_path(key), "Reading Vault path");

        let response = self
            .client
            .get(self.url(key))
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| self.transport_error(key, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                return Err(StoreError::Status {
                    key: self.full_path(key),
                    status: status.as_u16(),
                })
            }
            _ => {}
        }

        let body: ReadResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(key, e))?;

        // A record without an object payload reads as empty, which the
        // typed decode step reports as malformed.
        let fields = match body.data.map(|d| d.data) {
            Some(Value::Object(map)) => map.into_iter().collect(),
            _ => FieldMap::new(),
        };

        Ok(Some(fields))
    }

    async fn write(&self, key: &StoreKey, fields: &FieldMap) -> Result<(), StoreError> {
        info!(path = %self.full_path(key), "Writing to Vault path");

        let response = self
            .client
            .post(self.url(key))
            .header(TOKEN_HEADER, &self.token)
            .json(&json!({ "data": fields }))
            .send()
            .await
            .map_err(|e| self.transport_error(key, e))?;

        if !response.status().is_success() {
            return Err(StoreError::Status {
                key: self.full_path(key),
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }
}

impl std::fmt::Debug for VaultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultStore")
            .field("address", &self.address)
            .field("prefix", &self.prefix)
            .field("has_token", &!self.token.is_empty())
            .finish()
    }
}
