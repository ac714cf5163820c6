//! Comparing findings snapshots across audit runs.

use permwatch_core::{Finding, Findings, Severity};
use serde::Serialize;
use std::collections::BTreeMap;

/// A finding whose id persisted but whose severity changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reclassified {
    pub id: String,
    pub previous: Severity,
    pub current: Severity,
}

/// Difference between two findings snapshots, keyed by finding id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FindingsDiff {
    /// In `current` only.
    pub introduced: Vec<Finding>,
    /// In `previous` only.
    pub resolved: Vec<Finding>,
    /// In both (as they appear in `current`).
    pub persisting: Vec<Finding>,
    /// Subset of `persisting` whose severity changed.
    pub reclassified: Vec<Reclassified>,
}

impl FindingsDiff {
    pub fn between(previous: &Findings, current: &Findings) -> Self {
        let before: BTreeMap<&str, &Finding> = previous
            .findings
            .iter()
            .map(|f| (f.id.as_str(), f))
            .collect();
        let after: BTreeMap<&str, &Finding> = current
            .findings
            .iter()
            .map(|f| (f.id.as_str(), f))
            .collect();

        let mut diff = Self::default();
        for (id, finding) in &after {
            match before.get(id) {
                None => diff.introduced.push((*finding).clone()),
                Some(old) => {
                    if old.severity != finding.severity {
                        diff.reclassified.push(Reclassified {
                            id: id.to_string(),
                            previous: old.severity,
                            current: finding.severity,
                        });
                    }
                    diff.persisting.push((*finding).clone());
                }
            }
        }
        for (id, finding) in &before {
            if !after.contains_key(id) {
                diff.resolved.push((*finding).clone());
            }
        }
        diff
    }

    /// True when both snapshots hold the same ids with the same severities.
    pub fn is_unchanged(&self) -> bool {
        self.introduced.is_empty() && self.resolved.is_empty() && self.reclassified.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permwatch_core::{Action, FindingType};

    fn finding(user: &str, action: Action, finding_type: FindingType, severity: Severity) -> Finding {
        Finding {
            id: Finding::stable_id(finding_type, user, "accounts", action),
            severity,
            finding_type,
            user: user.to_string(),
            resource: "accounts".to_string(),
            action,
            description: String::new(),
            recommendation: String::new(),
            affected_resources: vec!["accounts".to_string()],
        }
    }

    #[test]
    fn test_diff_buckets() {
        let kept = finding("alice", Action::Delete, FindingType::UnauthorizedAccess, Severity::Low);
        let fixed = finding("bob", Action::Insert, FindingType::MissingPermission, Severity::Medium);
        let new = finding("carol", Action::Select, FindingType::UnauthorizedAccess, Severity::High);

        let previous = Findings::new(vec![kept.clone(), fixed.clone()]);
        let escalated = Finding {
            severity: Severity::Critical,
            ..kept.clone()
        };
        let current = Findings::new(vec![escalated.clone(), new.clone()]);

        let diff = FindingsDiff::between(&previous, &current);
        assert_eq!(diff.introduced, vec![new]);
        assert_eq!(diff.resolved, vec![fixed]);
        assert_eq!(diff.persisting, vec![escalated]);
        assert_eq!(
            diff.reclassified,
            vec![Reclassified {
                id: kept.id,
                previous: Severity::Low,
                current: Severity::Critical,
            }]
        );
        assert!(!diff.is_unchanged());
    }

    #[test]
    fn test_identical_snapshots_are_unchanged() {
        let findings = Findings::new(vec![finding(
            "alice",
            Action::Delete,
            FindingType::UnauthorizedAccess,
            Severity::Critical,
        )]);
        let diff = FindingsDiff::between(&findings, &findings.clone());
        assert!(diff.is_unchanged());
        assert_eq!(diff.persisting.len(), 1);
    }
}
