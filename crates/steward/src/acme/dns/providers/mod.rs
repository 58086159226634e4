//! DNS provider implementations
//!
//! - [`ExecProvider`] - hands records to an external program
//! - [`WebhookProvider`] - generic HTTP webhook

mod exec;
mod webhook;

pub use exec::ExecProvider;
pub use webhook::WebhookProvider;

use std::sync::Arc;
use std::time::Duration;

use super::provider::{DnsProvider, DnsProviderError, DnsResult};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolve a provider by name, reading its settings from the environment
pub fn create_provider(name: &str) -> DnsResult<Arc<dyn DnsProvider>> {
    create_provider_with(name, |var| std::env::var(var).ok())
}

/// Resolve a provider by name with an explicit settings lookup
pub fn create_provider_with<F>(name: &str, lookup: F) -> DnsResult<Arc<dyn DnsProvider>>
where
    F: Fn(&str) -> Option<String>,
{
    let require = |var: &str| {
        lookup(var)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                DnsProviderError::Configuration(format!(
                    "{} provider requires {} to be set",
                    name, var
                ))
            })
    };

    match name {
        "exec" => Ok(Arc::new(ExecProvider::new(require("EXEC_PATH")?))),
        "webhook" => {
            let provider = WebhookProvider::new(
                require("DNS_WEBHOOK_URL")?,
                lookup("DNS_WEBHOOK_AUTH_HEADER").filter(|h| !h.is_empty()),
                lookup("DNS_WEBHOOK_CREDENTIALS").filter(|c| !c.is_empty()),
                WEBHOOK_TIMEOUT,
            )?;
            Ok(Arc::new(provider))
        }
        other => Err(DnsProviderError::UnknownProvider(other.to_string())),
    }
}
