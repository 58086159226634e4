//! Account reconciliation
//!
//! Keeps the stored account identity consistent with the authority's
//! registration. The recovery policy is a pure function over
//! [`AccountState`]; [`AccountReconciler`] does the I/O around it.
//!
//! Writes happen only when something changed: a freshly generated key, or an
//! adopted or new registration. A consistent account is read-only.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use certsteward_common::StoreKey;

use crate::acme::{
    AccountIdentity, AccountKey, AccountRecord, AcmeClient, AcmeError, IssuedCertificate,
    ObtainRequest, Registration,
};
use crate::store::{decode_field, string_fields, Decoded, SecretStore, StoreError};

const ACCOUNT_FIELD: &str = "account";
const KEY_FIELD: &str = "pem";

/// Account reconciliation errors; any of them aborts the whole run
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("secret store error: {0}")]
    Store(#[from] StoreError),

    #[error("record '{key}' is corrupt: {reason}")]
    CorruptRecord { key: StoreKey, reason: String },

    #[error("failed to encode account record: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("no account key is stored and account re-registration is disabled")]
    KeyProvisioningDenied,

    #[error("no ACME registration found for '{email}' and account re-registration is disabled")]
    RegistrationNotFound { email: String },

    #[error("ACME account operation failed: {0}")]
    Acme(#[from] AcmeError),
}

/// Where the local identity stands relative to the authority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    /// No registration reference held
    Unregistered,
    /// A reference is held but the authority no longer honours it
    RegisteredStale,
    /// The authority confirmed the reference
    Registered,
}

/// Step taken to bring the identity back in line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing to do
    Keep,
    /// Use the registration found by presenting the key
    Adopt,
    /// Drop any reference and register afresh
    Reregister,
    /// Recovery is needed but not allowed
    Deny,
}

pub fn plan_recovery(state: AccountState, resolved_by_key: bool, allow_reregister: bool) -> Transition {
    match state {
        AccountState::Registered => Transition::Keep,
        AccountState::Unregistered | AccountState::RegisteredStale if resolved_by_key => {
            Transition::Adopt
        }
        AccountState::Unregistered | AccountState::RegisteredStale if allow_reregister => {
            Transition::Reregister
        }
        AccountState::Unregistered | AccountState::RegisteredStale => Transition::Deny,
    }
}

/// A registered identity together with the client it was confirmed through
#[derive(Debug)]
pub struct ReadyAccount {
    pub identity: AccountIdentity,
    pub client: Arc<dyn AcmeClient>,
    /// Whether reconciliation wrote anything back to the store
    pub changed: bool,
}

impl ReadyAccount {
    pub async fn obtain(&self, request: &ObtainRequest) -> Result<IssuedCertificate, AcmeError> {
        self.client.obtain_certificate(&self.identity, request).await
    }
}

pub struct AccountReconciler {
    store: Arc<dyn SecretStore>,
    client: Arc<dyn AcmeClient>,
    email: String,
    allow_reregister: bool,
}

impl AccountReconciler {
    pub fn new(
        store: Arc<dyn SecretStore>,
        client: Arc<dyn AcmeClient>,
        email: impl Into<String>,
        allow_reregister: bool,
    ) -> Self {
        Self {
            store,
            client,
            email: email.into(),
            allow_reregister,
        }
    }

    pub async fn ensure_account(&self) -> Result<ReadyAccount, AccountError> {
        let record = self.load_record().await?;
        let (key, mut changed) = match self.load_key().await? {
            Some(key) => (key, false),
            None if self.allow_reregister => {
                let key = AccountKey::generate()?;
                info!(thumbprint = %key.thumbprint(), "Generated new ACME account key");
                self.write_key(&key).await?;
                (key, true)
            }
            None => return Err(AccountError::KeyProvisioningDenied),
        };

        let mut identity = match record {
            Some(record) => {
                if record.email != self.email {
                    warn!(
                        stored = %record.email,
                        configured = %self.email,
                        "Stored account email differs from configuration, keeping stored email"
                    );
                }
                AccountIdentity::from_record(record, key)
            }
            None => {
                debug!(email = %self.email, "No account record stored");
                AccountIdentity::unregistered(self.email.clone(), key)
            }
        };

        let state = self.confirm(&identity).await?;
        let resolved = match state {
            AccountState::Registered => None,
            _ => self.resolve(&identity).await?,
        };

        match plan_recovery(state, resolved.is_some(), self.allow_reregister) {
            Transition::Keep => {
                debug!(email = %identity.email, "ACME account is consistent");
            }
            Transition::Adopt => {
                identity.registration = resolved;
                self.write_record(&identity).await?;
                changed = true;
            }
            Transition::Reregister => {
                identity.registration = Some(self.client.register(&identity).await?);
                self.write_record(&identity).await?;
                changed = true;
            }
            Transition::Deny => {
                return Err(AccountError::RegistrationNotFound {
                    email: identity.email,
                })
            }
        }

        Ok(ReadyAccount {
            identity,
            client: Arc::clone(&self.client),
            changed,
        })
    }

    /// Ask the authority whether the held reference is still good
    async fn confirm(&self, identity: &AccountIdentity) -> Result<AccountState, AccountError> {
        let Some(registration) = &identity.registration else {
            return Ok(AccountState::Unregistered);
        };

        match self.client.query_registration(identity).await {
            Ok(_) => Ok(AccountState::Registered),
            Err(e) if e.is_rejection() => {
                warn!(uri = %registration.uri, error = %e, "Stored ACME registration is stale");
                Ok(AccountState::RegisteredStale)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn resolve(
        &self,
        identity: &AccountIdentity,
    ) -> Result<Option<Registration>, AccountError> {
        match self.client.resolve_registration_by_key(identity).await {
            Ok(registration) => {
                info!(uri = %registration.uri, "Found ACME registration for account key");
                Ok(Some(registration))
            }
            Err(e) if e.is_rejection() => {
                info!(error = %e, "No ACME registration bound to account key");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn load_record(&self) -> Result<Option<AccountRecord>, AccountError> {
        let key = StoreKey::account();
        let fields = self.store.read(&key).await?;

        match decode_field(fields.as_ref(), ACCOUNT_FIELD) {
            Decoded::NotFound => Ok(None),
            Decoded::Malformed(reason) => Err(AccountError::CorruptRecord { key, reason }),
            Decoded::Found(json) => serde_json::from_str(&json).map(Some).map_err(|e| {
                AccountError::CorruptRecord {
                    key,
                    reason: e.to_string(),
                }
            }),
        }
    }

    async fn load_key(&self) -> Result<Option<AccountKey>, AccountError> {
        let key = StoreKey::key();
        let fields = self.store.read(&key).await?;

        match decode_field(fields.as_ref(), KEY_FIELD) {
            Decoded::NotFound => Ok(None),
            Decoded::Malformed(reason) => Err(AccountError::CorruptRecord { key, reason }),
            Decoded::Found(pem) => AccountKey::from_pem(&pem).map(Some).map_err(|e| {
                AccountError::CorruptRecord {
                    key,
                    reason: e.to_string(),
                }
            }),
        }
    }

    async fn write_key(&self, account_key: &AccountKey) -> Result<(), AccountError> {
        let fields = string_fields([(KEY_FIELD, account_key.to_pem())]);
        self.store.write(&StoreKey::key(), &fields).await?;
        Ok(())
    }

    async fn write_record(&self, identity: &AccountIdentity) -> Result<(), AccountError> {
        let key = StoreKey::account();
        let json = serde_json::to_string(&identity.record()).map_err(AccountError::Encode)?;

        self.store
            .write(&key, &string_fields([(ACCOUNT_FIELD, json)]))
            .await?;
        info!(email = %identity.email, "Saved ACME account record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_is_kept() {
        for resolved in [true, false] {
            for allow in [true, false] {
                assert_eq!(
                    plan_recovery(AccountState::Registered, resolved, allow),
                    Transition::Keep
                );
            }
        }
    }

    #[test]
    fn test_resolution_wins_over_reregistration() {
        for state in [AccountState::Unregistered, AccountState::RegisteredStale] {
            assert_eq!(plan_recovery(state, true, false), Transition::Adopt);
            assert_eq!(plan_recovery(state, true, true), Transition::Adopt);
        }
    }

    #[test]
    fn test_reregistration_policy() {
        for state in [AccountState::Unregistered, AccountState::RegisteredStale] {
            assert_eq!(plan_recovery(state, false, true), Transition::Reregister);
            assert_eq!(plan_recovery(state, false, false), Transition::Deny);
        }
    }

    #[test]
    fn test_encode_failure_is_not_corruption() {
        let cause = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = AccountError::Encode(cause);

        assert!(!matches!(err, AccountError::CorruptRecord { .. }));
        assert!(err.to_string().starts_with("failed to encode account record"));
    }
}
