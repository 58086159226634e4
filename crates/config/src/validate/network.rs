//! Address validation
//!
//! Only checks that addresses are usable; nothing is dialled here.

use std::net::SocketAddr;

use super::{ErrorCategory, ValidationError, ValidationResult};
use crate::{Config, StoreBackend};

/// Validate the DNS resolver and Vault addresses
pub fn validate_addresses(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    if !is_host_port(&config.dns_address) {
        result.add_error(ValidationError::new(
            ErrorCategory::Network,
            format!(
                "DNS address '{}' is not a host:port pair",
                config.dns_address
            ),
        ));
    }

    if config.store.backend == StoreBackend::Vault && !config.is_dev() {
        if config.vault.approle_role_id.is_empty() || config.vault.approle_secret_id.is_empty() {
            result.add_error(ValidationError::new(
                ErrorCategory::Storage,
                "Vault AppRole role and secret IDs are required outside the dev environment",
            ));
        }
    }

    result
}

/// `ip:port`, `[v6]:port` or `hostname:port`; nothing is resolved
fn is_host_port(address: &str) -> bool {
    if address.parse::<SocketAddr>().is_ok() {
        return true;
    }

    let Some((host, port)) = address.rsplit_once(':') else {
        return false;
    };
    !host.is_empty()
        && port.parse::<u16>().is_ok()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_')
}
