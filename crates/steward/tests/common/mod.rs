//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rcgen::{BasicConstraints, CertificateParams, IsCa, KeyPair};
use serde_json::json;

use certsteward::acme::{AccountIdentity, AccountKey, AccountRecord, Registration};
use certsteward::reconcile::CertificateRecord;
use certsteward::store::string_fields;
use certsteward::{AcmeClient, AcmeError, IssuedCertificate, MemoryStore, ObtainRequest};
use certsteward_common::StoreKey;

pub const EMAIL: &str = "ops@example.com";

/// Self-signed certificate for `domains` expiring at `not_after`
pub fn mint(domains: &[&str], not_after: DateTime<Utc>, ca: bool) -> CertificateRecord {
    let key = KeyPair::generate().unwrap();
    let mut params =
        CertificateParams::new(domains.iter().map(|d| d.to_string()).collect::<Vec<_>>()).unwrap();
    params.not_after = time::OffsetDateTime::from_unix_timestamp(not_after.timestamp()).unwrap();
    if ca {
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    }
    let cert = params.self_signed(&key).unwrap();

    CertificateRecord {
        certificate: cert.pem(),
        private_key: key.serialize_pem(),
        issuer_certificate: String::new(),
    }
}

pub fn seed_certificate(store: &MemoryStore, canonical: &str, record: &CertificateRecord) {
    store.insert(StoreKey::certificate(canonical), record.to_fields());
}

pub fn seed_key(store: &MemoryStore) -> AccountKey {
    let key = AccountKey::generate().unwrap();
    store.insert(StoreKey::key(), string_fields([("pem", key.to_pem())]));
    key
}

pub fn seed_account(store: &MemoryStore, email: &str, uri: Option<&str>) {
    let record = AccountRecord {
        email: email.to_string(),
        registration: uri.map(|uri| Registration {
            body: json!({ "status": "valid" }),
            uri: uri.to_string(),
        }),
    };
    store.insert(
        StoreKey::account(),
        string_fields([("account", serde_json::to_string(&record).unwrap())]),
    );
}

pub fn stored_account(store: &MemoryStore) -> AccountRecord {
    let fields = store.get(&StoreKey::account()).expect("account record");
    serde_json::from_str(fields["account"].as_str().unwrap()).unwrap()
}

/// Authority that knows at most one account, bound to whatever key asks
#[derive(Debug, Default)]
pub struct FakeAcme {
    /// Registration URL the authority holds for the key
    pub server_account: Mutex<Option<String>>,
    /// Fail every call as if the network were down
    pub offline: bool,
    /// Canonical domains whose orders fail validation
    pub failing: HashSet<String>,
    pub registrations: AtomicUsize,
    pub resolutions: AtomicUsize,
    pub orders: Mutex<Vec<Vec<String>>>,
}

impl FakeAcme {
    pub fn with_account(uri: &str) -> Self {
        Self {
            server_account: Mutex::new(Some(uri.to_string())),
            ..Default::default()
        }
    }

    pub fn failing(domains: &[&str]) -> Self {
        Self {
            failing: domains.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), AcmeError> {
        if self.offline {
            return Err(AcmeError::Http("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AcmeClient for FakeAcme {
    async fn query_registration(
        &self,
        identity: &AccountIdentity,
    ) -> Result<Registration, AcmeError> {
        self.check_online()?;
        let held = identity
            .registration
            .as_ref()
            .ok_or(AcmeError::NoRegistration)?;

        match self.server_account.lock().as_deref() {
            Some(uri) if uri == held.uri => Ok(held.clone()),
            _ => Err(AcmeError::AccountDoesNotExist),
        }
    }

    async fn resolve_registration_by_key(
        &self,
        _identity: &AccountIdentity,
    ) -> Result<Registration, AcmeError> {
        self.check_online()?;
        self.resolutions.fetch_add(1, Ordering::SeqCst);

        match self.server_account.lock().clone() {
            Some(uri) => Ok(Registration {
                body: json!({ "status": "valid" }),
                uri,
            }),
            None => Err(AcmeError::AccountDoesNotExist),
        }
    }

    async fn register(&self, identity: &AccountIdentity) -> Result<Registration, AcmeError> {
        self.check_online()?;
        let n = self.registrations.fetch_add(1, Ordering::SeqCst) + 1;
        let uri = format!("https://acme.test/acct/{}", n);
        *self.server_account.lock() = Some(uri.clone());

        Ok(Registration {
            body: json!({ "status": "valid", "contact": [format!("mailto:{}", identity.email)] }),
            uri,
        })
    }

    async fn obtain_certificate(
        &self,
        _identity: &AccountIdentity,
        request: &ObtainRequest,
    ) -> Result<IssuedCertificate, AcmeError> {
        self.check_online()?;
        self.orders.lock().push(request.domains.clone());

        let canonical = &request.domains[0];
        if self.failing.contains(canonical) {
            return Err(AcmeError::Challenge {
                domain: canonical.clone(),
                message: "TXT record not found".to_string(),
            });
        }

        let names: Vec<&str> = request.domains.iter().map(String::as_str).collect();
        let minted = mint(&names, Utc::now() + Duration::days(90), false);
        Ok(IssuedCertificate {
            domains: request.domains.clone(),
            certificate: minted.certificate,
            issuer_certificate: "-----BEGIN CERTIFICATE-----\nissuer\n-----END CERTIFICATE-----\n"
                .to_string(),
            private_key: minted.private_key,
        })
    }
}
