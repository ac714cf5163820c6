//! Deterministic permission drift for testing the audit.
//!
//! The injector mutates stored permissions in three ways: granting an action
//! the policy does not allow, revoking one it requires, and restoring the
//! baseline.

use crate::baseline::seed;
use crate::error::StoreError;
use crate::store::PermissionWriter;
use permwatch_core::{AccessPolicy, Action, PermissionRecord, User};

/// Applies drift to a permission store.
pub struct ErrorInjector<'a, W: PermissionWriter + ?Sized> {
    writer: &'a W,
}

impl<'a, W: PermissionWriter + ?Sized> ErrorInjector<'a, W> {
    pub fn new(writer: &'a W) -> Self {
        Self { writer }
    }

    /// Grant `action` on `table` to `username`.
    ///
    /// The team is taken from the user's existing rows; a user with no rows
    /// is [`StoreError::UserNotFound`].
    pub async fn grant_excess(
        &self,
        username: &str,
        table: &str,
        action: Action,
    ) -> Result<(), StoreError> {
        let team = self
            .writer
            .team_of(username)
            .await?
            .ok_or_else(|| StoreError::UserNotFound {
                username: username.to_string(),
            })?;

        self.writer
            .upsert(&PermissionRecord::granted(username, team, table, action))
            .await?;

        tracing::info!(
            user = %username,
            table = %table,
            action = %action,
            "Injected excess grant"
        );
        Ok(())
    }

    /// Mark an existing grant as revoked. Absent records are left alone.
    ///
    /// Returns whether a record was changed.
    pub async fn revoke_required(
        &self,
        username: &str,
        table: &str,
        action: Action,
    ) -> Result<bool, StoreError> {
        let changed = self
            .writer
            .set_granted(username, table, action, false)
            .await?;

        if changed == 0 {
            tracing::debug!(
                user = %username,
                table = %table,
                action = %action,
                "No record to revoke"
            );
        } else {
            tracing::info!(
                user = %username,
                table = %table,
                action = %action,
                "Injected revocation"
            );
        }
        Ok(changed > 0)
    }

    /// Replace all records with the policy baseline in one transaction.
    ///
    /// Returns the number of records written.
    pub async fn reset_to_baseline(
        &self,
        policy: &AccessPolicy,
        users: &[User],
    ) -> Result<usize, StoreError> {
        let written = seed(self.writer, policy, users).await?;
        tracing::info!(records = written, "Reset permissions to baseline");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryPermissionStore;
    use crate::store::PermissionStore;
    use permwatch_core::TablePermission;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn finance_policy() -> AccessPolicy {
        AccessPolicy::default().with_team(
            "finance",
            vec![
                TablePermission::new("accounts", [Action::Select, Action::Insert, Action::Update]),
                TablePermission::new("transactions", [Action::Select]),
            ],
        )
    }

    #[tokio::test]
    async fn test_grant_excess_requires_known_user() {
        let store = MemoryPermissionStore::new();
        let injector = ErrorInjector::new(&store);

        let err = injector
            .grant_excess("ghost", "accounts", Action::Delete)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UserNotFound { username } if username == "ghost"));
    }

    #[tokio::test]
    async fn test_grant_then_reset_restores_baseline() {
        let store = MemoryPermissionStore::new();
        let injector = ErrorInjector::new(&store);
        let policy = finance_policy();
        let users = vec![User::new("alice", "finance")];

        injector.reset_to_baseline(&policy, &users).await.unwrap();
        let fresh = store.all_records().await.unwrap();

        injector
            .grant_excess("alice", "accounts", Action::Delete)
            .await
            .unwrap();
        assert!(store.granted_permissions("alice").await.unwrap()["accounts"]
            .contains(&Action::Delete));

        injector.reset_to_baseline(&policy, &users).await.unwrap();
        assert_eq!(store.all_records().await.unwrap(), fresh);
    }

    #[tokio::test]
    async fn test_revoke_required_absent_is_noop() {
        let store = MemoryPermissionStore::new();
        let injector = ErrorInjector::new(&store);
        injector
            .reset_to_baseline(&finance_policy(), &[User::new("alice", "finance")])
            .await
            .unwrap();
        let before = store.all_records().await.unwrap();

        let changed = injector
            .revoke_required("alice", "orders", Action::Select)
            .await
            .unwrap();
        assert!(!changed);
        assert_eq!(store.all_records().await.unwrap(), before);

        assert!(injector
            .revoke_required("alice", "accounts", Action::Insert)
            .await
            .unwrap());
        assert_eq!(
            store.granted_permissions("alice").await.unwrap()["accounts"],
            BTreeSet::from([Action::Select, Action::Update])
        );
    }
}
