//! Access policy model.
//!
//! An access policy maps team names to the table permissions every member of
//! that team is expected to hold. The document form is:
//!
//! ```yaml
//! teams:
//!   finance:
//!     - table: accounts
//!       actions: [SELECT, INSERT, UPDATE]
//!     - table: transactions
//!       actions: [SELECT]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Effective permissions of a subject: table name → granted actions.
pub type PermissionMap = BTreeMap<String, BTreeSet<Action>>;

/// Database action that can be granted on a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Select,
    Insert,
    Update,
    Delete,
}

impl Action {
    /// All actions in canonical order.
    pub const ALL: [Action; 4] = [Action::Select, Action::Insert, Action::Update, Action::Delete];

    /// The SQL literal for this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown action literal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action '{0}' (expected one of SELECT, INSERT, UPDATE, DELETE)")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SELECT" => Ok(Self::Select),
            "INSERT" => Ok(Self::Insert),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// Actions a team may perform on one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePermission {
    /// Table name.
    pub table: String,
    /// Allowed actions (a set; duplicates in the document collapse).
    pub actions: BTreeSet<Action>,
}

impl TablePermission {
    pub fn new(table: impl Into<String>, actions: impl IntoIterator<Item = Action>) -> Self {
        Self {
            table: table.into(),
            actions: actions.into_iter().collect(),
        }
    }
}

/// Declared access policy: team name → table permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub teams: BTreeMap<String, Vec<TablePermission>>,
}

impl AccessPolicy {
    /// Add (or extend) a team entry. Mostly useful for building policies in code.
    pub fn with_team(mut self, team: impl Into<String>, permissions: Vec<TablePermission>) -> Self {
        self.teams.entry(team.into()).or_default().extend(permissions);
        self
    }

    /// Check whether the policy has an entry for a team.
    pub fn has_team(&self, team: &str) -> bool {
        self.teams.contains_key(team)
    }

    /// Expected permissions for a team, unioning repeated table entries.
    ///
    /// Returns `None` when the team has no policy entry.
    pub fn expected_permissions(&self, team: &str) -> Option<PermissionMap> {
        let entries = self.teams.get(team)?;
        let mut expected = PermissionMap::new();
        for entry in entries {
            expected
                .entry(entry.table.clone())
                .or_default()
                .extend(entry.actions.iter().copied());
        }
        Some(expected)
    }

    /// Structural problems with this policy, as human-readable messages.
    ///
    /// An empty result means the policy is structurally valid.
    pub fn structural_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for (team, entries) in &self.teams {
            if team.trim().is_empty() {
                issues.push("team name must not be blank".to_string());
            }
            for (index, entry) in entries.iter().enumerate() {
                if entry.table.trim().is_empty() {
                    issues.push(format!(
                        "team '{}' entry {}: table name must not be blank",
                        team, index
                    ));
                }
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finance_policy() -> AccessPolicy {
        AccessPolicy::default().with_team(
            "finance",
            vec![
                TablePermission::new("accounts", [Action::Select, Action::Insert]),
                TablePermission::new("transactions", [Action::Select]),
                TablePermission::new("accounts", [Action::Update, Action::Select]),
            ],
        )
    }

    #[test]
    fn test_expected_permissions_unions_repeated_tables() {
        let expected = finance_policy().expected_permissions("finance").unwrap();

        assert_eq!(expected.len(), 2);
        assert_eq!(
            expected["accounts"],
            BTreeSet::from([Action::Select, Action::Insert, Action::Update])
        );
        assert_eq!(expected["transactions"], BTreeSet::from([Action::Select]));
    }

    #[test]
    fn test_expected_permissions_unknown_team() {
        assert!(finance_policy().expected_permissions("legal").is_none());
    }

    #[test]
    fn test_action_round_trips_through_literal() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
        }
        assert!("TRUNCATE".parse::<Action>().is_err());
        assert!("select".parse::<Action>().is_err());
    }

    #[test]
    fn test_action_serializes_uppercase() {
        let json = serde_json::to_string(&Action::Delete).unwrap();
        assert_eq!(json, "\"DELETE\"");
    }

    #[test]
    fn test_structural_issues_blank_names() {
        let policy = AccessPolicy::default()
            .with_team(" ", vec![])
            .with_team("ops", vec![TablePermission::new("", [Action::Select])]);

        let issues = policy.structural_issues();
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().any(|i| i.contains("team 'ops' entry 0")));
    }
}
