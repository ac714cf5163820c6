//! Permission reads served by the database capability server.

use crate::capabilities::{DB_SERVER, DbTool};
use async_trait::async_trait;
use permwatch_core::{Action, PermissionMap};
use permwatch_mcp::{McpError, ToolRouter};
use permwatch_store::{PermissionStore, StoreError};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::BTreeSet;

/// A [`PermissionStore`] that forwards every read to `db_server` tools.
#[derive(Clone)]
pub struct RoutedPermissionStore {
    router: ToolRouter,
    server: String,
}

impl RoutedPermissionStore {
    pub fn new(router: ToolRouter) -> Self {
        Self {
            router,
            server: DB_SERVER.to_string(),
        }
    }

    /// Forward to a database server registered under another id.
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    async fn query<T: DeserializeOwned>(&self, tool: DbTool, arguments: Value) -> Result<T, StoreError> {
        let result = self
            .router
            .call(&self.server, tool.name(), arguments)
            .await
            .map_err(|e| self.routing_error(e))?;

        result.parse().map_err(|e| StoreError::InvalidRecord {
            reason: format!("{} returned an unexpected shape: {}", tool.name(), e),
        })
    }

    /// Only a server that cannot be reached at all reads as an unavailable store.
    fn routing_error(&self, error: McpError) -> StoreError {
        match error {
            McpError::SpawnFailed { .. } | McpError::Transport { .. } | McpError::Io(_) => {
                StoreError::unavailable(self.server.clone(), error.to_string())
            }
            other => StoreError::Routing {
                server: self.server.clone(),
                source: Box::new(other),
            },
        }
    }
}

#[async_trait]
impl PermissionStore for RoutedPermissionStore {
    async fn granted_permissions(&self, username: &str) -> Result<PermissionMap, StoreError> {
        self.query(DbTool::GetPrivileges, json!({ "username": username }))
            .await
    }

    async fn who_can(&self, table: &str, action: Action) -> Result<BTreeSet<String>, StoreError> {
        self.query(
            DbTool::WhoCan,
            json!({ "table_name": table, "action": action.as_str() }),
        )
        .await
    }

    async fn list_tables(&self) -> Result<Vec<String>, StoreError> {
        self.query(DbTool::ListTables, json!({})).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::DbCapability;
    use permwatch_core::PermissionRecord;
    use permwatch_mcp::{InMemoryInvoker, McpServer, ServerRegistry};
    use permwatch_store::MemoryPermissionStore;
    use std::sync::Arc;

    fn routed(tools: &str) -> RoutedPermissionStore {
        let servers = format!(
            "servers:\n  db_server:\n    name: Database Server\n    command: [permwatch, serve, db]\n    tools: [{}]\n",
            tools
        );
        let registry = Arc::new(ServerRegistry::from_yaml("servers", &servers).unwrap());
        let store = Arc::new(MemoryPermissionStore::with_records([PermissionRecord::granted(
            "alice", "finance", "accounts", Action::Select,
        )]));
        let server = Arc::new(McpServer::new("db", Arc::new(DbCapability::new(store))));

        let mut invoker = InMemoryInvoker::new();
        invoker.bind(registry.get(DB_SERVER).unwrap(), server).unwrap();
        RoutedPermissionStore::new(ToolRouter::new(registry, Arc::new(invoker)))
    }

    #[tokio::test]
    async fn test_reads_through_db_server() {
        let store = routed("db_list_tables, db_get_privileges, db_who_can");

        let granted = store.granted_permissions("alice").await.unwrap();
        assert_eq!(granted["accounts"], BTreeSet::from([Action::Select]));
        assert_eq!(store.list_tables().await.unwrap(), vec!["accounts".to_string()]);
    }

    #[tokio::test]
    async fn test_unexposed_tool_is_routing_error() {
        let store = routed("db_list_tables");

        let err = store.granted_permissions("alice").await.unwrap_err();
        match err {
            StoreError::Routing { server, source } => {
                assert_eq!(server, DB_SERVER);
                assert!(matches!(
                    source.downcast_ref::<McpError>(),
                    Some(McpError::ToolNotFound { .. })
                ));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
