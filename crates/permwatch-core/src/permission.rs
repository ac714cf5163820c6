//! Granted permission records as stored in the permission database.

use crate::policy::Action;
use serde::{Deserialize, Serialize};

/// One row of the permission store.
///
/// Unique on `(username, table, action)`. `granted = false` marks an explicit
/// revocation; for audit purposes it reads the same as an absent row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub username: String,
    pub team: String,
    pub table: String,
    pub action: Action,
    pub granted: bool,
}

impl PermissionRecord {
    /// Create a granted record.
    pub fn granted(
        username: impl Into<String>,
        team: impl Into<String>,
        table: impl Into<String>,
        action: Action,
    ) -> Self {
        Self {
            username: username.into(),
            team: team.into(),
            table: table.into(),
            action,
            granted: true,
        }
    }

    /// The unique key of this record.
    pub fn key(&self) -> (&str, &str, Action) {
        (&self.username, &self.table, self.action)
    }
}
