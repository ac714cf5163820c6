//! Severity rules.

use permwatch_core::{Action, AuditConfig, FindingType, Severity};

/// Classify a discrepancy. The first matching rule wins:
///
/// | condition | severity |
/// |---|---|
/// | unauthorized DELETE on a sensitive table | CRITICAL |
/// | unauthorized access to a sensitive table | HIGH |
/// | missing permission | MEDIUM |
/// | unauthorized access to any other table | LOW |
pub fn classify(
    finding_type: FindingType,
    table: &str,
    action: Action,
    config: &AuditConfig,
) -> Severity {
    let sensitive = config.is_sensitive(table);
    match finding_type {
        FindingType::UnauthorizedAccess if sensitive && action == Action::Delete => {
            Severity::Critical
        }
        FindingType::UnauthorizedAccess if sensitive => Severity::High,
        FindingType::MissingPermission => Severity::Medium,
        FindingType::UnauthorizedAccess => Severity::Low,
    }
}
