//! Planning: which capability server tools to call, and in what order.
//!
//! A [`Planner`] sees the task and the specialist agents the registry knows
//! about and returns a [`Plan`]. Reasoning components (for example a language
//! model) live behind this trait; [`StandardAuditPlanner`] is the
//! deterministic default.

use anyhow::Context;
use async_trait::async_trait;
use permwatch_mcp::ServerManifest;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Tool an agent must expose to produce findings.
pub const AUDIT_TOOL: &str = "audit_database";

/// Tool an agent may expose to refresh the access policy from policy text.
pub const INTERPRET_TOOL: &str = "interpret_policy";

/// Default task given to the orchestrator.
pub const DEFAULT_TASK: &str = "Perform a complete security audit: compare the access policy \
with the permissions granted in the database and report every violation.";

/// One tool call of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub server: String,
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

impl PlanStep {
    pub fn new(server: impl Into<String>, tool: impl Into<String>, arguments: Value) -> Self {
        Self {
            server: server.into(),
            tool: tool.into(),
            arguments,
        }
    }
}

/// Ordered tool calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub summary: String,
    pub steps: Vec<PlanStep>,
}

#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, task: &str, agents: &[ServerManifest]) -> anyhow::Result<Plan>;
}

/// Interprets the policy when an agent can, then audits with the first agent
/// exposing [`AUDIT_TOOL`].
#[derive(Debug, Clone, Default)]
pub struct StandardAuditPlanner;

#[async_trait]
impl Planner for StandardAuditPlanner {
    async fn plan(&self, task: &str, agents: &[ServerManifest]) -> anyhow::Result<Plan> {
        let mut steps = Vec::new();

        let declares = |m: &&ServerManifest, tool: &str| m.tools.iter().any(|t| t == tool);

        if let Some(interpreter) = agents.iter().find(|m| declares(m, INTERPRET_TOOL)) {
            steps.push(PlanStep::new(
                &interpreter.id,
                INTERPRET_TOOL,
                json!({ "input": task }),
            ));
        }

        let auditor = agents
            .iter()
            .find(|m| declares(m, AUDIT_TOOL))
            .with_context(|| format!("no agent server declares the '{}' tool", AUDIT_TOOL))?;
        steps.push(PlanStep::new(&auditor.id, AUDIT_TOOL, json!({ "input": task })));

        Ok(Plan {
            summary: format!("{} step(s) ending with {}.{}", steps.len(), auditor.id, AUDIT_TOOL),
            steps,
        })
    }
}
