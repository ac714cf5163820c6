//! In-memory permission store, mainly for tests.

use crate::error::StoreError;
use crate::store::{PermissionStore, PermissionWriter};
use async_trait::async_trait;
use permwatch_core::{Action, PermissionMap, PermissionRecord};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

type RecordKey = (String, String, Action);

#[derive(Debug, Clone)]
struct Row {
    team: String,
    granted: bool,
}

/// Permission store backed by an ordered map.
#[derive(Debug, Default)]
pub struct MemoryPermissionStore {
    rows: RwLock<BTreeMap<RecordKey, Row>>,
}

impl MemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `records`.
    pub fn with_records(records: impl IntoIterator<Item = PermissionRecord>) -> Self {
        let rows = records.into_iter().map(split_record).collect();
        Self {
            rows: RwLock::new(rows),
        }
    }
}

fn split_record(record: PermissionRecord) -> (RecordKey, Row) {
    (
        (record.username, record.table, record.action),
        Row {
            team: record.team,
            granted: record.granted,
        },
    )
}

#[async_trait]
impl PermissionStore for MemoryPermissionStore {
    async fn granted_permissions(&self, username: &str) -> Result<PermissionMap, StoreError> {
        let rows = self.rows.read().await;
        let mut granted = PermissionMap::new();
        for ((user, table, action), row) in rows.iter() {
            if user == username && row.granted {
                granted.entry(table.clone()).or_default().insert(*action);
            }
        }
        Ok(granted)
    }

    async fn who_can(&self, table: &str, action: Action) -> Result<BTreeSet<String>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|(key, row)| key.1 == table && key.2 == action && row.granted)
            .map(|(key, _)| key.0.clone())
            .collect())
    }

    async fn list_tables(&self) -> Result<Vec<String>, StoreError> {
        let rows = self.rows.read().await;
        let tables: BTreeSet<&String> = rows.keys().map(|(_, table, _)| table).collect();
        Ok(tables.into_iter().cloned().collect())
    }
}

#[async_trait]
impl PermissionWriter for MemoryPermissionStore {
    async fn team_of(&self, username: &str) -> Result<Option<String>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .find(|(key, _)| key.0 == username)
            .map(|(_, row)| row.team.clone()))
    }

    async fn upsert(&self, record: &PermissionRecord) -> Result<(), StoreError> {
        let (key, row) = split_record(record.clone());
        self.rows.write().await.insert(key, row);
        Ok(())
    }

    async fn set_granted(
        &self,
        username: &str,
        table: &str,
        action: Action,
        granted: bool,
    ) -> Result<u64, StoreError> {
        let mut rows = self.rows.write().await;
        let key = (username.to_string(), table.to_string(), action);
        match rows.get_mut(&key) {
            Some(row) => {
                row.granted = granted;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn replace_all(&self, records: &[PermissionRecord]) -> Result<(), StoreError> {
        let replacement = records.iter().cloned().map(split_record).collect();
        *self.rows.write().await = replacement;
        Ok(())
    }

    async fn all_records(&self) -> Result<Vec<PermissionRecord>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .map(|((username, table, action), row)| PermissionRecord {
                username: username.clone(),
                team: row.team.clone(),
                table: table.clone(),
                action: *action,
                granted: row.granted,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_reads() {
        let store = MemoryPermissionStore::with_records([
            PermissionRecord::granted("alice", "finance", "accounts", Action::Select),
            PermissionRecord::granted("bob", "finance", "accounts", Action::Select),
            PermissionRecord {
                granted: false,
                ..PermissionRecord::granted("bob", "finance", "transactions", Action::Select)
            },
        ]);

        assert_eq!(
            store.who_can("accounts", Action::Select).await.unwrap(),
            BTreeSet::from(["alice".to_string(), "bob".to_string()])
        );
        assert!(!store.granted_permissions("bob").await.unwrap().contains_key("transactions"));
        assert_eq!(
            store.list_tables().await.unwrap(),
            vec!["accounts".to_string(), "transactions".to_string()]
        );
        assert_eq!(store.team_of("bob").await.unwrap().as_deref(), Some("finance"));
    }
}
