//! Domain group list validation

use std::collections::HashMap;

use certsteward_common::DomainGroup;

use super::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};

/// Validate the configured domain groups
///
/// Two groups sharing a canonical domain would overwrite each other's
/// certificate record, so that is an error. A name listed twice inside one
/// group is only a warning.
pub fn validate_domains(groups: &[DomainGroup]) -> ValidationResult {
    let mut result = ValidationResult::new();

    if groups.is_empty() {
        result.add_error(ValidationError::new(
            ErrorCategory::Domains,
            "No domain groups configured",
        ));
        return result;
    }

    let mut canonicals: HashMap<&str, usize> = HashMap::new();
    for (index, group) in groups.iter().enumerate() {
        if let Some(first) = canonicals.insert(group.canonical(), index) {
            result.add_error(ValidationError::new(
                ErrorCategory::Domains,
                format!(
                    "Canonical domain '{}' is used by groups {} and {}",
                    group.canonical(),
                    first,
                    index
                ),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for domain in group.domains() {
            if !seen.insert(domain.as_str()) {
                result.add_warning(ValidationWarning::new(format!(
                    "Domain '{}' is listed more than once in group '{}'",
                    domain, group
                )));
            }
        }
    }

    result
}
