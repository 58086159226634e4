//! Configuration loading for certsteward
//!
//! Settings come from the process environment; the list of domain groups
//! comes from a YAML file whose location is itself an environment setting.
//!
//! ```yaml
//! domains:
//!   - "example.com,www.example.com"
//!   - "other.org"
//! ```

pub mod validate;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use validator::Validate;

use certsteward_common::DomainGroup;

pub use validate::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};

/// Let's Encrypt staging directory, used unless a server URL is configured
pub const DEFAULT_ACME_SERVER_URL: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variables missing or malformed
    #[error("failed getting config from env: {0}")]
    Env(#[from] envy::Error),

    /// Domains file could not be read
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Domains file is not valid YAML or contains an invalid group
    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogFormat {
    Json,
    Logfmt,
}

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            // tracing has no level above error
            LogLevel::Error | LogLevel::Fatal => "error",
        }
    }
}

/// Which secret store backend holds accounts and certificates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Vault,
    File,
}

/// ACME related settings
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct AcmeConfig {
    #[validate(email)]
    pub account_email: String,
    #[validate(length(min = 1))]
    pub dns_challenge_provider: String,
    pub dns_propagation_requirement: bool,
    pub reregister_account: bool,
    #[validate(url)]
    pub server_url: String,
}

/// Vault connection settings
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct VaultConfig {
    #[validate(url)]
    pub address: String,
    pub approle_role_id: String,
    pub approle_secret_id: String,
    pub kv_storage_path: String,
    pub dev_root_token: String,
}

/// Secret store selection
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub file_path: PathBuf,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
}

/// Complete runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub acme: AcmeConfig,
    pub vault: VaultConfig,
    pub store: StoreConfig,
    pub log: LogConfig,
    pub dns_address: String,
    pub environment: String,
    pub domains_file: PathBuf,
    pub renew_before_days: u32,
    pub domains: Vec<DomainGroup>,
}

/// Flat view of the environment, as `envy` sees it
#[derive(Debug, Deserialize)]
struct EnvConfig {
    acme_account_email: String,
    acme_dns_challenge_provider: String,
    #[serde(default = "default_true")]
    acme_dns_propagation_requirement: bool,
    #[serde(default)]
    acme_reregister_account: bool,
    #[serde(default = "default_server_url")]
    acme_server_url: String,

    #[serde(default = "default_vault_addr")]
    vault_addr: String,
    #[serde(default)]
    vault_approle_role_id: String,
    #[serde(default)]
    vault_approle_secret_id: String,
    #[serde(default = "default_kv_storage_path")]
    vault_kv_storage_path: String,
    #[serde(default)]
    vault_dev_root_token_id: String,

    #[serde(default = "default_store_backend")]
    secret_store_backend: StoreBackend,
    #[serde(default = "default_store_file_path")]
    secret_store_file_path: PathBuf,

    #[serde(default = "default_log_format")]
    log_format: LogFormat,
    #[serde(default = "default_log_level")]
    log_level: LogLevel,

    #[serde(default = "default_dns_address")]
    dns_address: String,
    #[serde(default = "default_environment")]
    environment: String,
    #[serde(default = "default_domains_file")]
    certsteward_domains_file: PathBuf,
    #[serde(default = "default_renew_before_days")]
    certsteward_renew_before_days: u32,
}

#[derive(Debug, Deserialize)]
struct DomainsFile {
    #[serde(default)]
    domains: Vec<DomainGroup>,
}

fn default_true() -> bool {
    true
}

fn default_server_url() -> String {
    DEFAULT_ACME_SERVER_URL.to_string()
}

fn default_vault_addr() -> String {
    "http://127.0.0.1:8200".to_string()
}

fn default_kv_storage_path() -> String {
    "secret/data/certsteward/".to_string()
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Vault
}

fn default_store_file_path() -> PathBuf {
    PathBuf::from("/var/lib/certsteward")
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_dns_address() -> String {
    "127.0.0.1:53".to_string()
}

fn default_environment() -> String {
    "prod".to_string()
}

fn default_domains_file() -> PathBuf {
    PathBuf::from("/code/domains.yml")
}

fn default_renew_before_days() -> u32 {
    30
}

impl Config {
    /// Load configuration from the process environment and the domains file
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from an explicit set of variables
    ///
    /// The domains file named by the variables is still read from disk.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let env: EnvConfig = envy::from_iter(vars)?;
        let domains = load_domains(&env.certsteward_domains_file)?;

        Ok(Self {
            acme: AcmeConfig {
                account_email: env.acme_account_email,
                dns_challenge_provider: env.acme_dns_challenge_provider,
                dns_propagation_requirement: env.acme_dns_propagation_requirement,
                reregister_account: env.acme_reregister_account,
                server_url: env.acme_server_url,
            },
            vault: VaultConfig {
                address: env.vault_addr,
                approle_role_id: env.vault_approle_role_id,
                approle_secret_id: env.vault_approle_secret_id,
                kv_storage_path: env.vault_kv_storage_path,
                dev_root_token: env.vault_dev_root_token_id,
            },
            store: StoreConfig {
                backend: env.secret_store_backend,
                file_path: env.secret_store_file_path,
            },
            log: LogConfig {
                format: env.log_format,
                level: env.log_level,
            },
            dns_address: env.dns_address,
            environment: env.environment,
            domains_file: env.certsteward_domains_file,
            renew_before_days: env.certsteward_renew_before_days,
            domains,
        })
    }

    /// Whether this is a development deployment
    pub fn is_dev(&self) -> bool {
        self.environment == "dev"
    }

    /// Run all validation checks
    pub fn validate(&self) -> ValidationResult {
        validate::validate_config(self)
    }
}

/// Read the domain groups from a YAML file
pub fn load_domains(path: &Path) -> Result<Vec<DomainGroup>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let file: DomainsFile = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(
        path = %path.display(),
        groups = file.domains.len(),
        "Loaded domain groups"
    );

    Ok(file.domains)
}
