//! ACME client adapter
//!
//! # Architecture
//!
//! - [`AcmeClient`] - the operations the reconciliation core needs from a
//!   certificate authority
//! - [`DirectoryClient`] - the production implementation. Account
//!   operations are signed requests made directly against the directory;
//!   certificate orders go through `instant-acme`.
//! - [`AccountIdentity`] / [`AccountKey`] - the local account credential
//! - [`dns`] - DNS-01 challenge providers and propagation checks
//!
//! # Order Flow
//!
//! 1. Restore the account in `instant-acme` from the identity's key and URL
//! 2. Create an order for every domain of the group
//! 3. Publish one `_acme-challenge` TXT record per pending authorization
//! 4. Optionally wait until the configured resolver sees every record
//! 5. Mark challenges ready and poll the order until it is ready
//! 6. Finalize with a CSR for a freshly generated key and download the chain
//! 7. Remove the TXT records, whatever the outcome

mod account;
mod directory;
pub mod dns;
mod error;
mod issuer;
mod jws;

use std::fmt::Debug;

use async_trait::async_trait;

pub use account::{AccountIdentity, AccountKey, AccountRecord, Registration};
pub use directory::DirectoryClient;
pub use error::{AcmeError, Problem};

/// What to order and how to prove control of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObtainRequest {
    /// Domains for the certificate, canonical first
    pub domains: Vec<String>,
    /// DNS provider name, resolved by [`dns::create_provider`]
    pub challenge_provider: String,
    /// Wait for records to be visible before asking for validation
    pub propagation_required: bool,
    /// Resolver consulted for propagation checks, as `host:port`
    pub dns_resolver: String,
}

/// A freshly issued certificate
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    pub domains: Vec<String>,
    /// Leaf followed by the issuer chain, PEM
    pub certificate: String,
    /// Issuer chain alone, PEM
    pub issuer_certificate: String,
    /// Certificate private key, PEM
    pub private_key: String,
}

impl Debug for IssuedCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedCertificate")
            .field("domains", &self.domains)
            .finish_non_exhaustive()
    }
}

/// Operations required from a certificate authority
#[async_trait]
pub trait AcmeClient: Send + Sync + Debug {
    /// Fetch the registration the identity points at; it must be valid
    async fn query_registration(
        &self,
        identity: &AccountIdentity,
    ) -> Result<Registration, AcmeError>;

    /// Find the registration bound to the identity's key
    async fn resolve_registration_by_key(
        &self,
        identity: &AccountIdentity,
    ) -> Result<Registration, AcmeError>;

    /// Register a new account for the identity, agreeing to the terms of service
    async fn register(&self, identity: &AccountIdentity) -> Result<Registration, AcmeError>;

    /// Order, validate and download a certificate
    async fn obtain_certificate(
        &self,
        identity: &AccountIdentity,
        request: &ObtainRequest,
    ) -> Result<IssuedCertificate, AcmeError>;
}
