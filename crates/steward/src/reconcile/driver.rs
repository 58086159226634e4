//! Renewal driver
//!
//! Walks the configured domain groups one at a time. A failure is recorded
//! against the group's canonical domain and the next group is processed.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{error, info};

use certsteward_common::{DomainGroup, StoreKey};

use super::account::ReadyAccount;
use super::certificate::{
    load_certificate, store_certificate, CertificateError, CertificateRecord, StoredCertificate,
};
use super::decision::RenewalPolicy;
use crate::acme::{AcmeError, ObtainRequest};
use crate::store::{SecretStore, StoreError};

#[derive(Debug, Error)]
pub enum RenewalError {
    #[error("secret store error: {0}")]
    Store(#[from] StoreError),

    #[error("record '{key}' is corrupt: {reason}")]
    CorruptRecord { key: StoreKey, reason: String },

    #[error(transparent)]
    Acme(#[from] AcmeError),

    #[error("certificate renewal failed for: {}", domains.join(", "))]
    Failed { domains: Vec<String> },
}

/// How domain control is proven
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeSettings {
    pub provider: String,
    pub propagation_required: bool,
    /// `host:port` of the resolver used for propagation checks
    pub dns_resolver: String,
}

/// Outcome of one run, by canonical domain
#[derive(Debug, Default)]
pub struct RunReport {
    pub renewed: Vec<String>,
    pub up_to_date: Vec<String>,
    pub failed: Vec<String>,
    /// Poisoned bundles found along the way; they were reissued
    pub diagnostics: Vec<CertificateError>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn into_result(self) -> Result<RunReport, RenewalError> {
        if self.failed.is_empty() {
            Ok(self)
        } else {
            Err(RenewalError::Failed {
                domains: self.failed,
            })
        }
    }
}

enum GroupOutcome {
    Renewed,
    UpToDate,
}

pub struct RenewalDriver {
    store: Arc<dyn SecretStore>,
    account: ReadyAccount,
    policy: RenewalPolicy,
    challenge: ChallengeSettings,
}

impl RenewalDriver {
    pub fn new(
        store: Arc<dyn SecretStore>,
        account: ReadyAccount,
        policy: RenewalPolicy,
        challenge: ChallengeSettings,
    ) -> Self {
        Self {
            store,
            account,
            policy,
            challenge,
        }
    }

    pub async fn run(&self, groups: &[DomainGroup]) -> RunReport {
        let start = Instant::now();
        let mut report = RunReport::default();

        info!(
            group_count = groups.len(),
            threshold_days = self.policy.threshold_days,
            "Checking certificates for renewal"
        );

        for group in groups {
            let canonical = group.canonical().to_string();
            match self.reconcile_group(group, &mut report.diagnostics).await {
                Ok(GroupOutcome::Renewed) => report.renewed.push(canonical),
                Ok(GroupOutcome::UpToDate) => report.up_to_date.push(canonical),
                Err(e) => {
                    error!(domain = %canonical, error = %e, "Certificate renewal failed");
                    report.failed.push(canonical);
                }
            }
        }

        info!(
            renewed = report.renewed.len(),
            up_to_date = report.up_to_date.len(),
            failed = report.failed.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Certificate renewal run complete"
        );
        report
    }

    async fn reconcile_group(
        &self,
        group: &DomainGroup,
        diagnostics: &mut Vec<CertificateError>,
    ) -> Result<GroupOutcome, RenewalError> {
        let canonical = group.canonical();
        let stored = load_certificate(self.store.as_ref(), canonical).await?;

        if let StoredCertificate::Corrupt(reason) = &stored {
            return Err(RenewalError::CorruptRecord {
                key: StoreKey::certificate(canonical),
                reason: reason.clone(),
            });
        }

        let verdict = self.policy.decide(group, stored.view());
        if let Some(diagnostic) = verdict.diagnostic(canonical) {
            error!(domain = %canonical, error = %diagnostic, "Stored certificate is invalid, reissuing");
            diagnostics.push(diagnostic);
        }
        if !verdict.must_reissue() {
            return Ok(GroupOutcome::UpToDate);
        }

        let request = ObtainRequest {
            domains: group.domains().to_vec(),
            challenge_provider: self.challenge.provider.clone(),
            propagation_required: self.challenge.propagation_required,
            dns_resolver: self.challenge.dns_resolver.clone(),
        };
        let issued = self.account.obtain(&request).await?;

        store_certificate(
            self.store.as_ref(),
            canonical,
            &CertificateRecord::from(issued),
        )
        .await?;
        info!(domain = %canonical, "Certificate renewed and stored");
        Ok(GroupOutcome::Renewed)
    }
}
