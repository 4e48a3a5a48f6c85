//! Draft validation through garde.

use crate::domain::DomainError;
use garde::{Report, Validate};

/// Validate a draft, turning the garde report into a `ValidationError`
pub fn validate_struct<T>(value: &T) -> Result<(), DomainError>
where
    T: Validate,
    T::Context: Default,
{
    value
        .validate()
        .map_err(|report| DomainError::ValidationError(describe_report(&report)))
}

/// One `field: message` entry per violation, joined with `; `
fn describe_report(report: &Report) -> String {
    let mut entries: Vec<String> = report
        .iter()
        .map(|(path, error)| {
            let path = path.to_string();
            if path.is_empty() {
                error.message().to_string()
            } else {
                format!("{}: {}", path, error.message())
            }
        })
        .collect();
    entries.sort();
    entries.join("; ")
}
