//! DNS-01 challenge support
//!
//! - [`DnsProvider`] - publishes and removes TXT records
//! - [`ChallengeSolver`] - drives a provider for a set of challenges
//! - [`PropagationChecker`] - confirms records are visible before validation
//!
//! Providers are selected by name with [`create_provider`]:
//!
//! | name | settings |
//! |---|---|
//! | `exec` | `EXEC_PATH`: program run as `<program> present|cleanup <fqdn> <value>` |
//! | `webhook` | `DNS_WEBHOOK_URL`, optional `DNS_WEBHOOK_AUTH_HEADER` and `DNS_WEBHOOK_CREDENTIALS` |

pub mod challenge;
mod propagation;
mod provider;
mod providers;

pub use challenge::{compute_challenge_value, ChallengeSolver, Dns01Challenge};
pub use propagation::{PropagationChecker, PropagationConfig};
pub use provider::{
    challenge_record_fqdn, normalize_domain, DnsProvider, DnsProviderError, DnsResult, TxtRecord,
    ACME_CHALLENGE_RECORD, CHALLENGE_TTL,
};
pub use providers::{create_provider, create_provider_with, ExecProvider, WebhookProvider};

#[cfg(test)]
pub(crate) use provider::tests::MockDnsProvider;
