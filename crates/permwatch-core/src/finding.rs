//! Audit findings.
//!
//! A finding records one discrepancy between the declared policy and the
//! permissions a user actually holds. Finding ids are derived from
//! `(type, user, table, action)` only, so two audits of the same state produce
//! the same id set and snapshots can be diffed across runs.

use crate::policy::Action;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a finding, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// All severities from most to least severe (report order).
    pub const DESCENDING: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingType {
    /// The user holds an action the policy does not allow.
    UnauthorizedAccess,
    /// The user lacks an action the policy requires.
    MissingPermission,
}

impl FindingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnauthorizedAccess => "unauthorized_access",
            Self::MissingPermission => "missing_permission",
        }
    }

    /// Short tag used in finding ids.
    fn id_tag(&self) -> &'static str {
        match self {
            Self::UnauthorizedAccess => "unauthorized",
            Self::MissingPermission => "missing",
        }
    }
}

impl fmt::Display for FindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected discrepancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Stable identifier, see [`Finding::stable_id`].
    pub id: String,
    pub severity: Severity,
    #[serde(rename = "type")]
    pub finding_type: FindingType,
    /// Affected username.
    pub user: String,
    /// Table name.
    pub resource: String,
    pub action: Action,
    pub description: String,
    pub recommendation: String,
    #[serde(default)]
    pub affected_resources: Vec<String>,
}

impl Finding {
    /// Deterministic id for a `(type, user, table, action)` tuple.
    ///
    /// Format: `find-{user}-{table}-{action}-{unauthorized|missing}`. Any `%` or `-`
    /// inside the user or table name is percent-encoded so distinct tuples never
    /// share an id.
    pub fn stable_id(finding_type: FindingType, user: &str, table: &str, action: Action) -> String {
        format!(
            "find-{}-{}-{}-{}",
            escape_id_part(user),
            escape_id_part(table),
            action.as_str(),
            finding_type.id_tag()
        )
    }
}

fn escape_id_part(part: &str) -> String {
    let mut escaped = String::with_capacity(part.len());
    for c in part.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '-' => escaped.push_str("%2D"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Report root produced by one audit run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Findings {
    #[serde(default)]
    pub findings: Vec<Finding>,
    pub audit_date: DateTime<Utc>,
}

impl Findings {
    /// Create a findings report dated now.
    pub fn new(findings: Vec<Finding>) -> Self {
        Self::dated(findings, Utc::now())
    }

    /// Create a findings report with an explicit audit date.
    pub fn dated(findings: Vec<Finding>, audit_date: DateTime<Utc>) -> Self {
        Self {
            findings,
            audit_date,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    /// Findings concerning one user.
    pub fn for_user<'a>(&'a self, user: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
        self.findings.iter().filter(move |f| f.user == user)
    }

    /// Number of findings with the given severity.
    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_finding() -> Finding {
        Finding {
            id: Finding::stable_id(FindingType::UnauthorizedAccess, "alice", "accounts", Action::Delete),
            severity: Severity::Critical,
            finding_type: FindingType::UnauthorizedAccess,
            user: "alice".to_string(),
            resource: "accounts".to_string(),
            action: Action::Delete,
            description: "alice can DELETE accounts".to_string(),
            recommendation: "Revoke DELETE on accounts from alice".to_string(),
            affected_resources: vec!["accounts".to_string()],
        }
    }

    #[test]
    fn test_stable_id_format() {
        assert_eq!(
            Finding::stable_id(FindingType::MissingPermission, "bob", "orders", Action::Insert),
            "find-bob-orders-INSERT-missing"
        );
        assert_eq!(
            Finding::stable_id(FindingType::UnauthorizedAccess, "alice", "accounts", Action::Delete),
            "find-alice-accounts-DELETE-unauthorized"
        );
    }

    #[test]
    fn test_stable_id_hyphenated_names_stay_distinct() {
        let left = Finding::stable_id(FindingType::UnauthorizedAccess, "a-b", "c", Action::Delete);
        let right = Finding::stable_id(FindingType::UnauthorizedAccess, "a", "b-c", Action::Delete);

        assert_eq!(left, "find-a%2Db-c-DELETE-unauthorized");
        assert_eq!(right, "find-a-b%2Dc-DELETE-unauthorized");
        assert_ne!(
            Finding::stable_id(FindingType::MissingPermission, "a%2Db", "c", Action::Select),
            Finding::stable_id(FindingType::MissingPermission, "a-b", "c", Action::Select)
        );
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_finding_wire_format() {
        let value = serde_json::to_value(sample_finding()).unwrap();

        assert_eq!(value["type"], "unauthorized_access");
        assert_eq!(value["severity"], "CRITICAL");
        assert_eq!(value["action"], "DELETE");
        assert_eq!(value["affected_resources"][0], "accounts");
    }

    #[test]
    fn findings_serialization_validates_against_schema() {
        let findings = Findings::new(vec![sample_finding()]);

        let instance = serde_json::to_value(&findings).expect("findings must serialize");
        let schema: serde_json::Value =
            serde_json::from_str(include_str!("../../../schemas/Findings.schema.json"))
                .expect("schema must parse");

        let validator = jsonschema::draft202012::options()
            .build(&schema)
            .expect("schema must compile");

        if !validator.is_valid(&instance) {
            let mut msgs = Vec::new();
            for (idx, err) in validator.iter_errors(&instance).take(20).enumerate() {
                msgs.push(format!("{}: {}", idx + 1, err));
            }
            panic!("findings did not validate: {}", msgs.join("; "));
        }
    }

    #[test]
    fn test_findings_round_trip_preserves_date() {
        let findings = Findings::new(vec![sample_finding()]);
        let json = serde_json::to_string(&findings).unwrap();
        let parsed: Findings = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, findings);
        assert_eq!(parsed.count_by_severity(Severity::Critical), 1);
        assert_eq!(parsed.for_user("alice").count(), 1);
    }
}
