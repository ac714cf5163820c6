//! The audit engine.
//!
//! For each user, the engine compares the permissions the user's team is
//! expected to hold (the union of its policy entries) with the permissions
//! the store reports as granted:
//!
//! - `actual − expected` becomes `unauthorized_access` findings
//! - `expected − actual` becomes `missing_permission` findings
//!
//! Users whose team has no policy entry are skipped and recorded as policy
//! gaps. Users are audited concurrently; any store error aborts the run.

use crate::error::AuditError;
use crate::severity::classify;
use futures::future::try_join_all;
use permwatch_core::{
    AccessPolicy, Action, AuditConfig, Finding, FindingType, Findings, PermissionMap, User,
};
use permwatch_store::PermissionStore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user skipped because their team has no policy entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyGap {
    pub username: String,
    pub team: String,
}

/// Everything one audit run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRun {
    /// Correlates log lines of one run.
    pub run_id: Uuid,
    pub findings: Findings,
    pub policy_gaps: Vec<PolicyGap>,
}

/// Compares declared policy with granted permissions.
#[derive(Debug, Clone, Default)]
pub struct AuditEngine {
    config: AuditConfig,
}

impl AuditEngine {
    pub fn new(config: AuditConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Audit every user and return the findings, sorted by id.
    pub async fn audit(
        &self,
        policy: &AccessPolicy,
        users: &[User],
        permissions: &dyn PermissionStore,
    ) -> Result<Findings, AuditError> {
        Ok(self.audit_run(policy, users, permissions).await?.findings)
    }

    /// Audit every user, keeping run metadata and policy gaps.
    pub async fn audit_run(
        &self,
        policy: &AccessPolicy,
        users: &[User],
        permissions: &dyn PermissionStore,
    ) -> Result<AuditRun, AuditError> {
        let run_id = Uuid::new_v4();
        tracing::info!(run_id = %run_id, users = users.len(), "Starting audit");

        let mut policy_gaps = Vec::new();
        let mut audits = Vec::new();
        for user in users {
            match policy.expected_permissions(&user.team) {
                Some(expected) => audits.push(self.audit_user(user, expected, permissions)),
                None => {
                    tracing::warn!(
                        run_id = %run_id,
                        user = %user.username,
                        team = %user.team,
                        "Team has no policy entry, skipping user"
                    );
                    policy_gaps.push(PolicyGap {
                        username: user.username.clone(),
                        team: user.team.clone(),
                    });
                }
            }
        }

        let mut findings: Vec<Finding> = try_join_all(audits).await?.into_iter().flatten().collect();
        findings.sort_by(|a, b| a.id.cmp(&b.id));

        tracing::info!(
            run_id = %run_id,
            findings = findings.len(),
            policy_gaps = policy_gaps.len(),
            "Audit complete"
        );

        Ok(AuditRun {
            run_id,
            findings: Findings::new(findings),
            policy_gaps,
        })
    }

    async fn audit_user(
        &self,
        user: &User,
        expected: PermissionMap,
        permissions: &dyn PermissionStore,
    ) -> Result<Vec<Finding>, AuditError> {
        let actual = permissions
            .granted_permissions(&user.username)
            .await
            .map_err(|source| AuditError::Store {
                username: user.username.clone(),
                source,
            })?;

        let mut findings = Vec::new();
        for (table, action) in difference(&actual, &expected) {
            findings.push(self.finding(FindingType::UnauthorizedAccess, user, table, action));
        }
        for (table, action) in difference(&expected, &actual) {
            findings.push(self.finding(FindingType::MissingPermission, user, table, action));
        }

        tracing::debug!(
            user = %user.username,
            team = %user.team,
            findings = findings.len(),
            "Audited user"
        );
        Ok(findings)
    }

    fn finding(&self, finding_type: FindingType, user: &User, table: &str, action: Action) -> Finding {
        let (description, recommendation) = match finding_type {
            FindingType::UnauthorizedAccess => (
                format!(
                    "User '{}' (team '{}') has {} on '{}', which the policy for team '{}' does not allow",
                    user.username, user.team, action, table, user.team
                ),
                format!("Revoke {} on '{}' from '{}'", action, table, user.username),
            ),
            FindingType::MissingPermission => (
                format!(
                    "User '{}' (team '{}') lacks {} on '{}', which the policy for team '{}' requires",
                    user.username, user.team, action, table, user.team
                ),
                format!("Grant {} on '{}' to '{}'", action, table, user.username),
            ),
        };

        Finding {
            id: Finding::stable_id(finding_type, &user.username, table, action),
            severity: classify(finding_type, table, action, &self.config),
            finding_type,
            user: user.username.clone(),
            resource: table.to_string(),
            action,
            description,
            recommendation,
            affected_resources: vec![table.to_string()],
        }
    }
}

/// `(table, action)` pairs present in `left` but not in `right`.
fn difference<'a>(
    left: &'a PermissionMap,
    right: &'a PermissionMap,
) -> impl Iterator<Item = (&'a str, Action)> + 'a {
    left.iter().flat_map(move |(table, actions)| {
        let allowed = right.get(table);
        actions
            .iter()
            .filter(move |action| !allowed.is_some_and(|set| set.contains(*action)))
            .map(move |action| (table.as_str(), *action))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use permwatch_core::{PermissionRecord, Severity, TablePermission};
    use permwatch_store::{MemoryPermissionStore, baseline_records};
    use pretty_assertions::assert_eq;

    fn finance_policy() -> AccessPolicy {
        AccessPolicy::default().with_team(
            "finance",
            vec![
                TablePermission::new("accounts", [Action::Select, Action::Insert, Action::Update]),
                TablePermission::new("transactions", [Action::Select]),
            ],
        )
    }

    fn engine() -> AuditEngine {
        AuditEngine::new(AuditConfig::with_sensitive_tables(["accounts", "transactions"]))
    }

    fn alice() -> User {
        User::new("alice", "finance")
    }

    #[tokio::test]
    async fn test_parity_yields_no_findings() {
        let policy = finance_policy();
        let users = vec![alice()];
        let store = MemoryPermissionStore::with_records(baseline_records(&policy, &users));

        let findings = engine().audit(&policy, &users, &store).await.unwrap();
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn test_extra_delete_on_sensitive_table_is_critical() {
        let policy = finance_policy();
        let users = vec![alice()];
        let mut records = baseline_records(&policy, &users);
        records.push(PermissionRecord::granted("alice", "finance", "accounts", Action::Delete));
        let store = MemoryPermissionStore::with_records(records);

        let findings = engine().audit(&policy, &users, &store).await.unwrap();
        assert_eq!(findings.len(), 1);

        let finding = &findings.findings[0];
        assert_eq!(finding.id, "find-alice-accounts-DELETE-unauthorized");
        assert_eq!(finding.severity, Severity::Critical);
        assert_eq!(finding.finding_type, FindingType::UnauthorizedAccess);
        assert_eq!(finding.affected_resources, vec!["accounts".to_string()]);
        assert!(finding.description.contains("finance"));
        assert!(finding.recommendation.starts_with("Revoke DELETE"));
    }

    #[tokio::test]
    async fn test_missing_permissions_one_finding_each() {
        let store = MemoryPermissionStore::with_records([
            PermissionRecord::granted("alice", "finance", "accounts", Action::Select),
            PermissionRecord::granted("alice", "finance", "transactions", Action::Select),
        ]);

        let findings = engine()
            .audit(&finance_policy(), &[alice()], &store)
            .await
            .unwrap();

        let ids: Vec<&str> = findings.findings.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "find-alice-accounts-INSERT-missing",
                "find-alice-accounts-UPDATE-missing",
            ]
        );
        assert!(findings
            .findings
            .iter()
            .all(|f| f.severity == Severity::Medium && f.finding_type == FindingType::MissingPermission));
    }

    #[tokio::test]
    async fn test_unknown_team_is_policy_gap() {
        let store = MemoryPermissionStore::with_records([PermissionRecord::granted(
            "bob", "legal", "contracts", Action::Select,
        )]);

        let run = engine()
            .audit_run(&finance_policy(), &[User::new("bob", "legal")], &store)
            .await
            .unwrap();

        assert!(run.findings.is_empty());
        assert_eq!(
            run.policy_gaps,
            vec![PolicyGap {
                username: "bob".to_string(),
                team: "legal".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_revoked_row_reads_as_missing() {
        let policy = finance_policy();
        let users = vec![alice()];
        let mut records = baseline_records(&policy, &users);
        for record in records.iter_mut() {
            if record.table == "transactions" {
                record.granted = false;
            }
        }
        let store = MemoryPermissionStore::with_records(records);

        let findings = engine().audit(&policy, &users, &store).await.unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings.findings[0].id, "find-alice-transactions-SELECT-missing");
    }

    #[tokio::test]
    async fn test_hyphenated_names_keep_every_finding() {
        let policy = finance_policy();
        let users = vec![User::new("a-b", "finance"), User::new("a", "finance")];
        let mut records = baseline_records(&policy, &users);
        records.push(PermissionRecord::granted("a-b", "finance", "c", Action::Delete));
        records.push(PermissionRecord::granted("a", "finance", "b-c", Action::Delete));
        let store = MemoryPermissionStore::with_records(records);

        let findings = engine().audit(&policy, &users, &store).await.unwrap();

        let found: Vec<(&str, &str)> = findings
            .findings
            .iter()
            .map(|f| (f.user.as_str(), f.resource.as_str()))
            .collect();
        assert_eq!(found, vec![("a-b", "c"), ("a", "b-c")]);
        assert_ne!(findings.findings[0].id, findings.findings[1].id);
    }
}
