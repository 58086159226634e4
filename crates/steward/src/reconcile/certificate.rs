//! Stored certificate bundles and the parts of the leaf that drive renewal

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use thiserror::Error;
use x509_parser::extensions::GeneralName;
use x509_parser::pem::parse_x509_pem;

use certsteward_common::StoreKey;

use crate::acme::IssuedCertificate;
use crate::store::{decode_fields, string_fields, Decoded, FieldMap, SecretStore, StoreError};

const CERTIFICATE_FIELD: &str = "certificate";
const PRIVATE_KEY_FIELD: &str = "private_key";
const ISSUER_FIELD: &str = "issuer_certificate";

/// Problems with a certificate's content
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertificateError {
    /// The leaf position of the bundle holds a CA certificate
    #[error("certificate bundle for '{domain}' has a CA certificate in the leaf position")]
    InvalidBundleShape { domain: String },

    #[error("failed to parse certificate: {0}")]
    Parse(String),
}

/// Certificate bundle as kept in the secret store
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    /// Leaf followed by the issuer chain, PEM
    pub certificate: String,
    pub private_key: String,
    pub issuer_certificate: String,
}

impl CertificateRecord {
    /// Decode a stored record; every field must be a string
    pub fn decode(record: Option<&FieldMap>) -> Decoded<Self> {
        decode_fields(
            record,
            &[CERTIFICATE_FIELD, PRIVATE_KEY_FIELD, ISSUER_FIELD],
        )
        .map(|mut fields| {
            let issuer_certificate = fields.pop().unwrap_or_default();
            let private_key = fields.pop().unwrap_or_default();
            let certificate = fields.pop().unwrap_or_default();
            Self {
                certificate,
                private_key,
                issuer_certificate,
            }
        })
    }

    pub fn to_fields(&self) -> FieldMap {
        string_fields([
            (CERTIFICATE_FIELD, self.certificate.as_str()),
            (PRIVATE_KEY_FIELD, self.private_key.as_str()),
            (ISSUER_FIELD, self.issuer_certificate.as_str()),
        ])
    }

    /// Parse the leaf certificate
    pub fn view(&self) -> Result<CertificateView, CertificateError> {
        CertificateView::parse(&self.certificate)
    }
}

impl From<IssuedCertificate> for CertificateRecord {
    fn from(issued: IssuedCertificate) -> Self {
        Self {
            certificate: issued.certificate,
            private_key: issued.private_key,
            issuer_certificate: issued.issuer_certificate,
        }
    }
}

impl std::fmt::Debug for CertificateRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateRecord")
            .field("certificate_len", &self.certificate.len())
            .field("issuer_certificate_len", &self.issuer_certificate.len())
            .finish_non_exhaustive()
    }
}

/// What the renewal decision needs to know about a leaf certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateView {
    /// DNS names from the subject alternative name extension
    pub domains: BTreeSet<String>,
    pub not_after: DateTime<Utc>,
    pub is_ca: bool,
}

impl CertificateView {
    /// Parse the first PEM block of `pem`
    pub fn parse(pem: &str) -> Result<Self, CertificateError> {
        let (_, block) = parse_x509_pem(pem.as_bytes())
            .map_err(|e| CertificateError::Parse(format!("invalid PEM: {}", e)))?;
        if block.label != "CERTIFICATE" {
            return Err(CertificateError::Parse(format!(
                "expected a CERTIFICATE block, found '{}'",
                block.label
            )));
        }

        let cert = block
            .parse_x509()
            .map_err(|e| CertificateError::Parse(e.to_string()))?;

        let mut domains = BTreeSet::new();
        if let Some(san) = cert
            .subject_alternative_name()
            .map_err(|e| CertificateError::Parse(e.to_string()))?
        {
            for name in &san.value.general_names {
                if let GeneralName::DNSName(dns) = name {
                    domains.insert(dns.to_string());
                }
            }
        }

        let is_ca = cert
            .basic_constraints()
            .map_err(|e| CertificateError::Parse(e.to_string()))?
            .is_some_and(|bc| bc.value.ca);

        let expiry = cert.validity().not_after.timestamp();
        let not_after = DateTime::from_timestamp(expiry, 0)
            .ok_or_else(|| CertificateError::Parse(format!("expiry {} out of range", expiry)))?;

        Ok(Self {
            domains,
            not_after,
            is_ca,
        })
    }
}

/// Outcome of reading a certificate from the store
#[derive(Debug)]
pub enum StoredCertificate {
    Absent,
    Present {
        record: CertificateRecord,
        view: CertificateView,
    },
    /// Something is stored but it is not a usable bundle
    Corrupt(String),
}

impl StoredCertificate {
    pub fn view(&self) -> Option<&CertificateView> {
        match self {
            StoredCertificate::Present { view, .. } => Some(view),
            _ => None,
        }
    }
}

/// Read and parse the bundle stored for `canonical`
pub async fn load_certificate(
    store: &dyn SecretStore,
    canonical: &str,
) -> Result<StoredCertificate, StoreError> {
    let key = StoreKey::certificate(canonical);
    let fields = store.read(&key).await?;

    Ok(match CertificateRecord::decode(fields.as_ref()) {
        Decoded::NotFound => StoredCertificate::Absent,
        Decoded::Malformed(reason) => StoredCertificate::Corrupt(reason),
        Decoded::Found(record) => match record.view() {
            Ok(view) => StoredCertificate::Present { record, view },
            Err(e) => StoredCertificate::Corrupt(e.to_string()),
        },
    })
}

/// Replace the bundle stored for `canonical`
pub async fn store_certificate(
    store: &dyn SecretStore,
    canonical: &str,
    record: &CertificateRecord,
) -> Result<(), StoreError> {
    store
        .write(&StoreKey::certificate(canonical), &record.to_fields())
        .await
}
