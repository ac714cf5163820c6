//! Storage traits.

use crate::error::StoreError;
use async_trait::async_trait;
use permwatch_core::{Action, PermissionMap, PermissionRecord};
use std::collections::BTreeSet;

/// Read access to actually-granted permissions.
///
/// Only rows with `granted = true` are visible through these reads; an
/// explicitly revoked row and a missing row look the same.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Tables and actions currently granted to `username`.
    async fn granted_permissions(&self, username: &str) -> Result<PermissionMap, StoreError>;

    /// Users currently granted `action` on `table`.
    async fn who_can(&self, table: &str, action: Action) -> Result<BTreeSet<String>, StoreError>;

    /// Names of the tables known to the store, sorted.
    async fn list_tables(&self) -> Result<Vec<String>, StoreError>;
}

/// Write access used by seeding and error injection.
#[async_trait]
pub trait PermissionWriter: PermissionStore {
    /// Team recorded on the user's existing rows, if any.
    async fn team_of(&self, username: &str) -> Result<Option<String>, StoreError>;

    /// Insert a record or overwrite the one with the same key.
    async fn upsert(&self, record: &PermissionRecord) -> Result<(), StoreError>;

    /// Set the `granted` flag of an existing record. Returns the number of rows changed.
    async fn set_granted(
        &self,
        username: &str,
        table: &str,
        action: Action,
        granted: bool,
    ) -> Result<u64, StoreError>;

    /// Atomically replace every record with `records`.
    async fn replace_all(&self, records: &[PermissionRecord]) -> Result<(), StoreError>;

    /// Every record, granted or not, sorted by key.
    async fn all_records(&self) -> Result<Vec<PermissionRecord>, StoreError>;
}

pub(crate) fn sort_records(records: &mut [PermissionRecord]) {
    records.sort_by(|a, b| a.key().cmp(&b.key()));
}
