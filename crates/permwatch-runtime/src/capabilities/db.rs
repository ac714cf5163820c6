//! Database capability server: read-only queries over granted permissions.

use super::{object_schema, parse_args};
use async_trait::async_trait;
use permwatch_core::Action;
use permwatch_mcp::{ToolDefinition, ToolError, ToolOutput, ToolProvider};
use permwatch_store::PermissionStore;
use serde::Deserialize;
use serde_json::{Value, json};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbTool {
    ListTables,
    GetPrivileges,
    WhoCan,
}

impl DbTool {
    pub const ALL: [DbTool; 3] = [DbTool::ListTables, DbTool::GetPrivileges, DbTool::WhoCan];

    pub fn name(&self) -> &'static str {
        match self {
            DbTool::ListTables => "db_list_tables",
            DbTool::GetPrivileges => "db_get_privileges",
            DbTool::WhoCan => "db_who_can",
        }
    }

    fn definition(&self) -> ToolDefinition {
        match self {
            DbTool::ListTables => ToolDefinition::new(
                self.name(),
                "List all tables in the database, excluding SQLite internal tables",
                object_schema(json!({}), &[]),
            ),
            DbTool::GetPrivileges => ToolDefinition::new(
                self.name(),
                "Get a user's granted permissions as a mapping of table to actions",
                object_schema(json!({"username": {"type": "string"}}), &["username"]),
            ),
            DbTool::WhoCan => ToolDefinition::new(
                self.name(),
                "List users who may perform an action on a table",
                object_schema(
                    json!({
                        "table_name": {"type": "string"},
                        "action": {"type": "string", "enum": ["SELECT", "INSERT", "UPDATE", "DELETE"]}
                    }),
                    &["table_name", "action"],
                ),
            ),
        }
    }
}

impl FromStr for DbTool {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| ToolError::UnknownTool(s.to_string()))
    }
}

#[derive(Deserialize)]
struct PrivilegesArgs {
    username: String,
}

#[derive(Deserialize)]
struct WhoCanArgs {
    table_name: String,
    action: String,
}

/// Serves [`DbTool`]s over a [`PermissionStore`].
pub struct DbCapability {
    store: Arc<dyn PermissionStore>,
}

impl DbCapability {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolProvider for DbCapability {
    fn tools(&self) -> Vec<ToolDefinition> {
        DbTool::ALL.iter().map(DbTool::definition).collect()
    }

    async fn call(&self, tool: &str, arguments: Value) -> Result<ToolOutput, ToolError> {
        let value = match tool.parse::<DbTool>()? {
            DbTool::ListTables => {
                let tables = self.store.list_tables().await.map_err(ToolError::failed)?;
                json!(tables)
            }
            DbTool::GetPrivileges => {
                let args: PrivilegesArgs = parse_args(arguments)?;
                let granted = self
                    .store
                    .granted_permissions(&args.username)
                    .await
                    .map_err(ToolError::failed)?;
                serde_json::to_value(granted).map_err(ToolError::failed)?
            }
            DbTool::WhoCan => {
                let args: WhoCanArgs = parse_args(arguments)?;
                let action = Action::from_str(&args.action.to_uppercase())
                    .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
                let users = self
                    .store
                    .who_can(&args.table_name, action)
                    .await
                    .map_err(ToolError::failed)?;
                json!(users)
            }
        };
        Ok(ToolOutput::Structured(value))
    }
}
