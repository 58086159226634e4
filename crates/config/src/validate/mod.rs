//! Configuration validation
//!
//! Checks run after loading and before any store or ACME traffic: field
//! shapes via `validator`, addresses, the domain group list, and a lint pass
//! for settings that are legal but probably unintended.

pub mod domains;
pub mod lint;
pub mod network;

use std::fmt;

use validator::Validate;

use crate::Config;

/// Validation error category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Field shape error (email, URL, empty value)
    Schema,
    /// Unusable network address
    Network,
    /// Domain group list problem
    Domains,
    /// Secret store settings
    Storage,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Schema => write!(f, "Schema"),
            ErrorCategory::Network => write!(f, "Network"),
            ErrorCategory::Domains => write!(f, "Domains"),
            ErrorCategory::Storage => write!(f, "Storage"),
        }
    }
}

/// Validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub category: ErrorCategory,
    pub message: String,
}

impl ValidationError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

/// Validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub message: String,
}

impl ValidationWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Validation result containing errors and warnings
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Merge another validation result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Check if validation passed (no errors)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Field-level checks declared with `#[validate(...)]`
pub fn validate_schema(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();
    let mut invalid = Vec::new();

    if let Err(errors) = config.acme.validate() {
        flatten_errors("acme", &errors, &mut invalid);
    }
    if let Err(errors) = config.vault.validate() {
        flatten_errors("vault", &errors, &mut invalid);
    }

    for (field, code) in invalid {
        result.add_error(ValidationError::new(
            ErrorCategory::Schema,
            format!("Field '{}' is invalid: {}", field, code),
        ));
    }

    result
}

/// Run every check against a loaded configuration
pub fn validate_config(config: &Config) -> ValidationResult {
    let mut result = validate_schema(config);
    result.merge(network::validate_addresses(config));
    result.merge(domains::validate_domains(&config.domains));
    result.merge(lint::lint_config(config));
    result
}

fn flatten_errors(
    prefix: &str,
    errors: &validator::ValidationErrors,
    out: &mut Vec<(String, String)>,
) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    out.push((path.clone(), error.code.to_string()));
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten_errors(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    flatten_errors(&format!("{}[{}]", path, index), inner, out);
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;

    use crate::*;

    /// A configuration that passes every check
    pub fn valid_config() -> Config {
        Config {
            acme: AcmeConfig {
                account_email: "ops@example.com".to_string(),
                dns_challenge_provider: "exec".to_string(),
                dns_propagation_requirement: true,
                reregister_account: false,
                server_url: DEFAULT_ACME_SERVER_URL.to_string(),
            },
            vault: VaultConfig {
                address: "http://127.0.0.1:8200".to_string(),
                approle_role_id: "role".to_string(),
                approle_secret_id: "secret".to_string(),
                kv_storage_path: "secret/data/certsteward/".to_string(),
                dev_root_token: String::new(),
            },
            store: StoreConfig {
                backend: StoreBackend::Vault,
                file_path: PathBuf::from("/var/lib/certsteward"),
            },
            log: LogConfig {
                format: LogFormat::Json,
                level: LogLevel::Info,
            },
            dns_address: "127.0.0.1:53".to_string(),
            environment: "prod".to_string(),
            domains_file: PathBuf::from("/code/domains.yml"),
            renew_before_days: 30,
            domains: vec!["example.com,www.example.com".parse().unwrap()],
        }
    }
}
