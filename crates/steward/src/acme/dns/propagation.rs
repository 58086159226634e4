//! DNS propagation checking for DNS-01 challenges
//!
//! Asks one configured recursive resolver, with caching disabled, until the
//! expected TXT value shows up.

use std::net::SocketAddr;
use std::time::Duration;

use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::{Resolver, TokioResolver};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::provider::DnsProviderError;

/// Timing for propagation checks
#[derive(Debug, Clone)]
pub struct PropagationConfig {
    /// Delay before the first lookup
    pub initial_delay: Duration,
    /// Interval between lookups
    pub check_interval: Duration,
    /// Give up after this long
    pub timeout: Duration,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            check_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(180),
        }
    }
}

/// Polls a resolver for challenge TXT records
#[derive(Debug)]
pub struct PropagationChecker {
    config: PropagationConfig,
    resolver: TokioResolver,
    nameserver: SocketAddr,
}

impl PropagationChecker {
    pub fn new(nameserver: SocketAddr) -> Self {
        Self::with_config(nameserver, PropagationConfig::default())
    }

    /// Build a checker for a `host:port` resolver address
    ///
    /// Host names are looked up once, through the system resolver.
    pub async fn for_address(address: &str) -> Result<Self, DnsProviderError> {
        Ok(Self::new(resolve_nameserver(address).await?))
    }

    pub fn with_config(nameserver: SocketAddr, config: PropagationConfig) -> Self {
        let mut resolver_config = ResolverConfig::new();
        resolver_config.add_name_server(NameServerConfig::new(nameserver, Protocol::Udp));
        resolver_config.add_name_server(NameServerConfig::new(nameserver, Protocol::Tcp));

        let mut opts = ResolverOpts::default();
        opts.timeout = Duration::from_secs(5);
        opts.attempts = 2;
        opts.cache_size = 0;

        let resolver =
            Resolver::builder_with_config(resolver_config, TokioConnectionProvider::default())
                .with_options(opts)
                .build();

        Self {
            config,
            resolver,
            nameserver,
        }
    }

    pub fn nameserver(&self) -> SocketAddr {
        self.nameserver
    }

    /// Wait until `fqdn` carries `expected_value`
    pub async fn wait_for_propagation(
        &self,
        fqdn: &str,
        expected_value: &str,
    ) -> Result<(), DnsProviderError> {
        let start = Instant::now();
        let deadline = start + self.config.timeout;

        debug!(
            record = %fqdn,
            nameserver = %self.nameserver,
            timeout_secs = self.config.timeout.as_secs(),
            "Waiting for DNS propagation"
        );

        tokio::time::sleep(self.config.initial_delay).await;

        loop {
            match self.check_record(fqdn, expected_value).await {
                Ok(true) => {
                    debug!(
                        record = %fqdn,
                        elapsed_secs = start.elapsed().as_secs(),
                        "DNS propagation confirmed"
                    );
                    return Ok(());
                }
                Ok(false) => trace!(record = %fqdn, "Record not yet propagated"),
                Err(e) => warn!(record = %fqdn, error = %e, "DNS lookup error"),
            }

            if Instant::now() > deadline {
                return Err(DnsProviderError::PropagationTimeout {
                    fqdn: fqdn.to_string(),
                    elapsed_secs: start.elapsed().as_secs(),
                });
            }

            tokio::time::sleep(self.config.check_interval).await;
        }
    }

    /// Whether the resolver currently returns `expected_value` for `fqdn`
    pub async fn check_record(
        &self,
        fqdn: &str,
        expected_value: &str,
    ) -> Result<bool, DnsProviderError> {
        // Absolute name so the resolver does not apply search domains
        let name = format!("{}.", fqdn.trim_end_matches('.'));

        match self.resolver.txt_lookup(name).await {
            Ok(records) => Ok(records.iter().any(|record| {
                let value: String = record
                    .txt_data()
                    .iter()
                    .map(|data| String::from_utf8_lossy(data))
                    .collect();
                trace!(record = %fqdn, found_value = %value, "Checking TXT record");
                value == expected_value
            })),
            Err(e) if e.is_no_records_found() => Ok(false),
            Err(e) => Err(DnsProviderError::Lookup {
                fqdn: fqdn.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

/// Resolve a `host:port` or `ip:port` resolver address to a socket address
pub async fn resolve_nameserver(address: &str) -> Result<SocketAddr, DnsProviderError> {
    let unusable = |message: String| DnsProviderError::Configuration(format!(
        "DNS resolver address '{}' is unusable: {}",
        address, message
    ));

    if let Ok(addr) = address.parse::<SocketAddr>() {
        return Ok(addr);
    }

    let mut addrs = tokio::net::lookup_host(address)
        .await
        .map_err(|e| unusable(e.to_string()))?;
    let addr = addrs
        .next()
        .ok_or_else(|| unusable("host name has no addresses".to_string()))?;

    debug!(address = %address, resolved = %addr, "Resolved DNS resolver address");
    Ok(addr)
}
