//! Database auditor agent.
//!
//! Reads the access policy and the user roster through the filesystem server,
//! reads granted permissions through the database server, and runs the
//! deterministic [`AuditEngine`]. The single `audit_database` tool returns the
//! resulting Findings document as structured content.

use super::{FS_SERVER, FsTool, object_schema, parse_args};
use crate::routed::RoutedPermissionStore;
use async_trait::async_trait;
use permwatch_audit::{AuditEngine, AuditRun};
use permwatch_core::{AccessPolicy, User, parse_roster};
use permwatch_mcp::{ToolDefinition, ToolError, ToolOutput, ToolProvider, ToolRouter};
use permwatch_policy::{PolicySource, load_policy};
use serde::Deserialize;
use serde_json::{Value, json};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditorTool {
    AuditDatabase,
}

impl AuditorTool {
    pub const ALL: [AuditorTool; 1] = [AuditorTool::AuditDatabase];

    pub fn name(&self) -> &'static str {
        match self {
            AuditorTool::AuditDatabase => "audit_database",
        }
    }
}

impl FromStr for AuditorTool {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| ToolError::UnknownTool(s.to_string()))
    }
}

#[derive(Deserialize)]
struct AuditArgs {
    /// Free-form task description from the orchestrator.
    #[serde(default)]
    input: Option<String>,
}

pub struct AuditorCapability {
    router: ToolRouter,
    engine: AuditEngine,
    permissions: RoutedPermissionStore,
}

impl AuditorCapability {
    pub fn new(router: ToolRouter, engine: AuditEngine) -> Self {
        Self {
            permissions: RoutedPermissionStore::new(router.clone()),
            router,
            engine,
        }
    }

    /// Run one audit with inputs fetched from the filesystem server.
    pub async fn run(&self) -> Result<AuditRun, ToolError> {
        let policy = self.fetch_policy().await?;
        let users = self.fetch_users().await?;

        let run = self
            .engine
            .audit_run(&policy, &users, &self.permissions)
            .await
            .map_err(ToolError::failed)?;

        for gap in &run.policy_gaps {
            tracing::warn!(
                run_id = %run.run_id,
                user = %gap.username,
                team = %gap.team,
                "User skipped: no policy for team"
            );
        }
        Ok(run)
    }

    async fn fetch_text(&self, tool: FsTool) -> Result<String, ToolError> {
        let result = self
            .router
            .call(FS_SERVER, tool.name(), json!({}))
            .await
            .map_err(ToolError::failed)?;
        result
            .as_text()
            .map(str::to_string)
            .ok_or_else(|| ToolError::Failed(format!("{} did not return text", tool.name())))
    }

    async fn fetch_policy(&self) -> Result<AccessPolicy, ToolError> {
        let text = self.fetch_text(FsTool::ReadAccessConfig).await?;
        let source = PolicySource::inline(FsTool::ReadAccessConfig.name(), text);
        load_policy(&source).map_err(ToolError::failed)
    }

    async fn fetch_users(&self) -> Result<Vec<User>, ToolError> {
        let text = self.fetch_text(FsTool::ReadUsersCsv).await?;
        parse_roster(&text).map_err(ToolError::failed)
    }
}

#[async_trait]
impl ToolProvider for AuditorCapability {
    fn tools(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition::new(
            AuditorTool::AuditDatabase.name(),
            "Audit database permissions against the access policy and return Findings \
             with stable ids and severities",
            object_schema(json!({"input": {"type": "string"}}), &[]),
        )]
    }

    async fn call(&self, tool: &str, arguments: Value) -> Result<ToolOutput, ToolError> {
        match tool.parse::<AuditorTool>()? {
            AuditorTool::AuditDatabase => {
                let args: AuditArgs = parse_args(arguments)?;
                if let Some(input) = &args.input {
                    tracing::debug!(input = %input, "Audit requested");
                }

                let run = self.run().await?;
                let findings = serde_json::to_value(&run.findings).map_err(ToolError::failed)?;
                Ok(ToolOutput::Structured(findings))
            }
        }
    }
}
