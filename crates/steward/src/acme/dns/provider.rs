//! DNS provider trait for DNS-01 challenges

use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

/// Result type for DNS operations
pub type DnsResult<T> = Result<T, DnsProviderError>;

/// Errors that can occur during DNS provider operations
#[derive(Debug, Error)]
pub enum DnsProviderError {
    /// No provider is registered under the configured name
    #[error("unknown DNS challenge provider '{0}'")]
    UnknownProvider(String),

    /// Provider settings missing or invalid
    #[error("invalid DNS provider configuration: {0}")]
    Configuration(String),

    /// Authentication failed with the DNS provider
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Record creation failed
    #[error("failed to create TXT record '{fqdn}': {message}")]
    RecordCreation { fqdn: String, message: String },

    /// Record deletion failed
    #[error("failed to delete TXT record '{fqdn}': {message}")]
    RecordDeletion { fqdn: String, message: String },

    /// API request failed
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// DNS lookup failed for a reason other than the record being absent
    #[error("DNS lookup for '{fqdn}' failed: {message}")]
    Lookup { fqdn: String, message: String },

    /// Record did not appear in time
    #[error("TXT record '{fqdn}' not visible after {elapsed_secs}s")]
    PropagationTimeout { fqdn: String, elapsed_secs: u64 },
}

/// One challenge TXT record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxtRecord {
    /// Domain being validated, wildcard prefix removed
    pub domain: String,
    /// Record name, e.g. `_acme-challenge.example.com`
    pub fqdn: String,
    /// Record content
    pub value: String,
}

impl TxtRecord {
    pub fn for_domain(domain: &str, value: impl Into<String>) -> Self {
        Self {
            domain: normalize_domain(domain).to_string(),
            fqdn: challenge_record_fqdn(domain),
            value: value.into(),
        }
    }
}

/// Trait for DNS providers that publish DNS-01 challenge records
#[async_trait]
pub trait DnsProvider: Send + Sync + Debug {
    /// Provider name as configured (e.g. "exec", "webhook")
    fn name(&self) -> &'static str;

    /// Publish `record`, returning an identifier for later removal
    async fn create_txt_record(&self, record: &TxtRecord) -> DnsResult<String>;

    /// Remove a record created by [`DnsProvider::create_txt_record`]
    ///
    /// Removing a record that is already gone is not an error.
    async fn delete_txt_record(&self, record: &TxtRecord, record_id: &str) -> DnsResult<()>;
}

/// ACME challenge record name prefix
pub const ACME_CHALLENGE_RECORD: &str = "_acme-challenge";

/// TTL for challenge records
pub const CHALLENGE_TTL: u32 = 60;

/// Strip a leading wildcard label
pub fn normalize_domain(domain: &str) -> &str {
    domain.strip_prefix("*.").unwrap_or(domain)
}

/// Full challenge record name for a domain
///
/// `example.com` and `*.example.com` both map to `_acme-challenge.example.com`.
pub fn challenge_record_fqdn(domain: &str) -> String {
    format!("{}.{}", ACME_CHALLENGE_RECORD, normalize_domain(domain))
}
