//! Configuration linting
//!
//! Settings that load fine but are rarely what an operator wants.

use super::{ValidationResult, ValidationWarning};
use crate::{Config, StoreBackend};

/// Certificates from public CAs rarely live longer than this
const TYPICAL_LIFETIME_DAYS: u32 = 90;

/// Lint configuration for likely mistakes
pub fn lint_config(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    if config.store.backend == StoreBackend::File && !config.is_dev() {
        result.add_warning(ValidationWarning::new(format!(
            "File secret store at '{}' used outside the dev environment",
            config.store.file_path.display()
        )));
    }

    if config.renew_before_days >= TYPICAL_LIFETIME_DAYS {
        result.add_warning(ValidationWarning::new(format!(
            "Renewal threshold of {} days reissues every certificate on every run",
            config.renew_before_days
        )));
    }

    if config.acme.reregister_account {
        result.add_warning(ValidationWarning::new(
            "Account re-registration is enabled; a lost account will be replaced silently",
        ));
    }

    result
}
