use crate::capabilities::{FS_SERVER, FsTool};
use crate::error::RuntimeError;
use crate::planner::{Plan, Planner};
use crate::report::render_markdown;
use permwatch_core::Findings;
use permwatch_mcp::{AGENT_MARKER, ToolCallResult, ToolRouter};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Outcome of one executed plan step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub server: String,
    pub tool: String,
    pub produced_findings: bool,
}

/// Everything an orchestrated audit produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Orchestration {
    pub run_id: Uuid,
    pub plan: Plan,
    pub steps: Vec<StepRecord>,
    pub findings: Findings,
    /// Where the reporting server stored the findings JSON.
    pub findings_path: Option<String>,
    /// Where the reporting server stored the Markdown report.
    pub report_path: Option<String>,
}

/// Discovers agents, asks the planner for a plan, runs it through the router
/// and persists the findings through the reporting server.
pub struct Orchestrator {
    router: ToolRouter,
    planner: Arc<dyn Planner>,
    agent_marker: String,
    reporting_server: String,
}

impl Orchestrator {
    pub fn new(router: ToolRouter, planner: Arc<dyn Planner>) -> Self {
        Self {
            router,
            planner,
            agent_marker: AGENT_MARKER.to_string(),
            reporting_server: FS_SERVER.to_string(),
        }
    }

    pub fn with_agent_marker(mut self, marker: impl Into<String>) -> Self {
        self.agent_marker = marker.into();
        self
    }

    pub fn with_reporting_server(mut self, server: impl Into<String>) -> Self {
        self.reporting_server = server.into();
        self
    }

    pub async fn run(&self, task: &str) -> Result<Orchestration, RuntimeError> {
        self.run_with_cancel(task, &CancellationToken::new()).await
    }

    /// Execute a full audit. Any failing step aborts the run.
    pub async fn run_with_cancel(
        &self,
        task: &str,
        cancel: &CancellationToken,
    ) -> Result<Orchestration, RuntimeError> {
        let run_id = Uuid::new_v4();

        let agents: Vec<_> = self
            .router
            .registry()
            .agent_servers_marked(&self.agent_marker)
            .into_iter()
            .cloned()
            .collect();
        tracing::info!(run_id = %run_id, agents = agents.len(), "Discovered agent servers");

        let plan = self
            .planner
            .plan(task, &agents)
            .await
            .map_err(|e| RuntimeError::Planning(format!("{:#}", e)))?;
        if plan.steps.is_empty() {
            return Err(RuntimeError::EmptyPlan(plan.summary));
        }
        tracing::info!(run_id = %run_id, steps = plan.steps.len(), summary = %plan.summary, "Plan ready");

        let mut steps = Vec::with_capacity(plan.steps.len());
        let mut findings = None;
        for step in &plan.steps {
            tracing::info!(run_id = %run_id, server = %step.server, tool = %step.tool, "Running step");
            let result = self
                .router
                .call_with_cancel(&step.server, &step.tool, step.arguments.clone(), cancel)
                .await?;

            let produced = match result.parse::<Findings>() {
                Ok(parsed) => {
                    findings = Some(parsed);
                    true
                }
                Err(_) => false,
            };
            steps.push(StepRecord {
                server: step.server.clone(),
                tool: step.tool.clone(),
                produced_findings: produced,
            });
        }

        let findings = findings.ok_or(RuntimeError::NoFindings)?;
        tracing::info!(run_id = %run_id, findings = findings.len(), "Persisting findings");

        let findings_json = serde_json::to_string_pretty(&findings)
            .map_err(|e| RuntimeError::unexpected(&self.reporting_server, "serialize", e))?;
        let findings_path = self
            .persist(
                FsTool::WriteFindingsJson,
                json!({ "findings_json": findings_json }),
                cancel,
            )
            .await?;
        let report_path = self
            .persist(
                FsTool::WriteReportMarkdown,
                json!({ "markdown": render_markdown(&findings) }),
                cancel,
            )
            .await?;

        tracing::info!(run_id = %run_id, "Orchestrated audit complete");
        Ok(Orchestration {
            run_id,
            plan,
            steps,
            findings,
            findings_path,
            report_path,
        })
    }

    async fn persist(
        &self,
        tool: FsTool,
        arguments: Value,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, RuntimeError> {
        let result = self
            .router
            .call_with_cancel(&self.reporting_server, tool.name(), arguments, cancel)
            .await?;

        Ok(match result {
            ToolCallResult::Structured(value) => value
                .get("path")
                .and_then(Value::as_str)
                .map(str::to_string),
            ToolCallResult::Text(_) => None,
        })
    }
}
