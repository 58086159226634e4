//! DNS-01 challenge management
//!
//! Publishes challenge records, optionally waits for them to be visible, and
//! removes them again.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::propagation::PropagationChecker;
use super::provider::{DnsProvider, DnsResult, TxtRecord};

/// DNS-01 record value: base64url(SHA-256(key authorization))
pub fn compute_challenge_value(key_authorization: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(key_authorization.as_bytes()))
}

/// A pending DNS-01 challenge
#[derive(Debug, Clone)]
pub struct Dns01Challenge {
    /// Identifier as ordered, wildcard included
    pub domain: String,
    pub record: TxtRecord,
    /// Challenge URL to mark ready
    pub url: String,
    /// Set once the record has been published
    pub record_id: Option<String>,
}

impl Dns01Challenge {
    pub fn new(domain: &str, key_authorization: &str, url: &str) -> Self {
        Self {
            domain: domain.to_string(),
            record: TxtRecord::for_domain(domain, compute_challenge_value(key_authorization)),
            url: url.to_string(),
            record_id: None,
        }
    }
}

/// Publishes and removes challenge records through a provider
#[derive(Debug)]
pub struct ChallengeSolver {
    provider: Arc<dyn DnsProvider>,
    propagation: Option<PropagationChecker>,
}

impl ChallengeSolver {
    /// `propagation` of `None` skips waiting for records to become visible
    pub fn new(provider: Arc<dyn DnsProvider>, propagation: Option<PropagationChecker>) -> Self {
        Self {
            provider,
            propagation,
        }
    }

    /// Publish the record for `challenge`
    pub async fn present(&self, challenge: &mut Dns01Challenge) -> DnsResult<()> {
        info!(
            domain = %challenge.domain,
            record = %challenge.record.fqdn,
            provider = %self.provider.name(),
            "Creating DNS-01 challenge record"
        );

        let record_id = self.provider.create_txt_record(&challenge.record).await?;
        debug!(domain = %challenge.domain, record_id = %record_id, "DNS record created");
        challenge.record_id = Some(record_id);
        Ok(())
    }

    /// Wait for the record to be visible, when required
    pub async fn wait_visible(&self, challenge: &Dns01Challenge) -> DnsResult<()> {
        let Some(checker) = &self.propagation else {
            debug!(domain = %challenge.domain, "Propagation check disabled");
            return Ok(());
        };

        checker
            .wait_for_propagation(&challenge.record.fqdn, &challenge.record.value)
            .await?;
        info!(domain = %challenge.domain, "DNS-01 challenge record propagated");
        Ok(())
    }

    /// Remove the record for `challenge`, logging rather than failing
    pub async fn cleanup(&self, challenge: &Dns01Challenge) {
        let Some(record_id) = &challenge.record_id else {
            debug!(domain = %challenge.domain, "No record to clean up");
            return;
        };

        match self
            .provider
            .delete_txt_record(&challenge.record, record_id)
            .await
        {
            Ok(()) => info!(domain = %challenge.domain, "DNS-01 challenge record cleaned up"),
            Err(e) => warn!(
                domain = %challenge.domain,
                record_id = %record_id,
                error = %e,
                "Failed to clean up DNS-01 challenge record"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acme::dns::provider::tests::MockDnsProvider;

    #[test]
    fn test_compute_challenge_value() {
        // SHA-256 digest is 43 base64url chars without padding
        let value = compute_challenge_value("token.thumbprint");
        assert_eq!(value.len(), 43);
        assert!(!value.contains('='));
        assert_eq!(value, compute_challenge_value("token.thumbprint"));
        assert_ne!(value, compute_challenge_value("other.thumbprint"));
    }

    #[test]
    fn test_challenge_for_wildcard() {
        let challenge = Dns01Challenge::new("*.a.com", "tok.thumb", "https://acme/chall/1");
        assert_eq!(challenge.record.fqdn, "_acme-challenge.a.com");
        assert_eq!(challenge.record.value, compute_challenge_value("tok.thumb"));
    }

    #[tokio::test]
    async fn test_present_and_cleanup() {
        let provider = Arc::new(MockDnsProvider::default());
        let solver = ChallengeSolver::new(provider.clone(), None);
        let mut challenge = Dns01Challenge::new("a.com", "k", "u");

        solver.present(&mut challenge).await.unwrap();
        solver.wait_visible(&challenge).await.unwrap();
        solver.cleanup(&challenge).await;

        assert_eq!(challenge.record_id.as_deref(), Some("rec-1"));
        assert_eq!(provider.created.lock().len(), 1);
        assert_eq!(provider.deleted.lock().as_slice(), ["rec-1"]);
    }

    #[tokio::test]
    async fn test_cleanup_skips_unpublished() {
        let provider = Arc::new(MockDnsProvider::default());
        let solver = ChallengeSolver::new(provider.clone(), None);

        solver.cleanup(&Dns01Challenge::new("a.com", "k", "u")).await;
        assert!(provider.deleted.lock().is_empty());
    }
}
