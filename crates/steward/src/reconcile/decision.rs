//! Renewal decision
//!
//! Rules, first match wins:
//!
//! 1. nothing stored: reissue
//! 2. leaf is a CA certificate: reissue, and report the bundle
//! 3. certificate names differ from the required set: reissue
//! 4. whole days left (floor of hours / 24) at or below the threshold: reissue
//!
//! Anything else is kept.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use certsteward_common::DomainGroup;

use super::certificate::{CertificateError, CertificateView};

/// Why a certificate has to be issued again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReissueReason {
    Missing,
    InvalidBundleShape,
    DomainsChanged,
    Expiring { days_remaining: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep { days_remaining: i64 },
    Reissue(ReissueReason),
}

impl Verdict {
    pub fn must_reissue(&self) -> bool {
        matches!(self, Verdict::Reissue(_))
    }

    /// Error to surface alongside the reissue, if the stored bundle was poisoned
    pub fn diagnostic(&self, domain: &str) -> Option<CertificateError> {
        match self {
            Verdict::Reissue(ReissueReason::InvalidBundleShape) => {
                Some(CertificateError::InvalidBundleShape {
                    domain: domain.to_string(),
                })
            }
            _ => None,
        }
    }
}

/// Whole days between `now` and `not_after`, rounded down
pub fn days_remaining(not_after: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let hours = (not_after - now).num_seconds().div_euclid(3600);
    hours.div_euclid(24)
}

pub fn decide(
    view: Option<&CertificateView>,
    required: &[String],
    threshold_days: u32,
    now: DateTime<Utc>,
) -> Verdict {
    let Some(view) = view else {
        return Verdict::Reissue(ReissueReason::Missing);
    };

    if view.is_ca {
        return Verdict::Reissue(ReissueReason::InvalidBundleShape);
    }

    let required: BTreeSet<&str> = required.iter().map(String::as_str).collect();
    let covered: BTreeSet<&str> = view.domains.iter().map(String::as_str).collect();
    if required != covered {
        return Verdict::Reissue(ReissueReason::DomainsChanged);
    }

    let days_remaining = days_remaining(view.not_after, now);
    if days_remaining > i64::from(threshold_days) {
        Verdict::Keep { days_remaining }
    } else {
        Verdict::Reissue(ReissueReason::Expiring { days_remaining })
    }
}

/// Renewal threshold applied to every domain group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalPolicy {
    pub threshold_days: u32,
}

impl RenewalPolicy {
    pub fn new(threshold_days: u32) -> Self {
        Self { threshold_days }
    }

    pub fn decide(&self, group: &DomainGroup, view: Option<&CertificateView>) -> Verdict {
        let verdict = decide(view, group.domains(), self.threshold_days, Utc::now());

        match verdict {
            Verdict::Keep { days_remaining } => debug!(
                domain = %group.canonical(),
                days_remaining,
                threshold_days = self.threshold_days,
                "Certificate is still valid"
            ),
            Verdict::Reissue(ReissueReason::Missing) => {
                info!(domain = %group.canonical(), "No certificate stored, issuing")
            }
            Verdict::Reissue(ReissueReason::InvalidBundleShape) => {}
            Verdict::Reissue(ReissueReason::DomainsChanged) => info!(
                domain = %group.canonical(),
                required = %group,
                covered = ?view.map(|v| &v.domains),
                "Certificate domains differ from configuration, reissuing"
            ),
            Verdict::Reissue(ReissueReason::Expiring { days_remaining }) => info!(
                domain = %group.canonical(),
                days_remaining,
                threshold_days = self.threshold_days,
                "Certificate is due for renewal"
            ),
        }

        verdict
    }
}
