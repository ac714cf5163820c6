//! `permwatch servers`, `call` and `orchestrate` commands.

use super::{load_config, load_registry, stdio_router};
use anyhow::{Context, Result};
use permwatch_mcp::ToolCallResult;
use permwatch_runtime::{DEFAULT_TASK, Orchestrator, StandardAuditPlanner};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub fn list(config_path: &Path, agents_only: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = load_registry(&config)?;

    let servers = if agents_only {
        registry.agent_servers_marked(&config.router.agent_marker)
    } else {
        registry.list().collect()
    };

    println!("\n🧩 Capability Servers ({}):", servers.len());
    for server in servers {
        println!("\n   {} ({})", server.id, server.name);
        if !server.description.is_empty() {
            println!("      {}", server.description);
        }
        println!("      command: {}", server.command.join(" "));
        if server.tools.is_empty() {
            println!("      tools: (undeclared)");
        } else {
            println!("      tools: {}", server.tools.join(", "));
        }
    }
    Ok(())
}

pub async fn call(config_path: &Path, server: &str, tool: &str, args: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let arguments: Value =
        serde_json::from_str(args).with_context(|| format!("--args is not JSON: {}", args))?;
    if !arguments.is_object() {
        anyhow::bail!("--args must be a JSON object");
    }

    let router = stdio_router(config_path, &config, load_registry(&config)?);
    let cancel = cancel_on_ctrl_c();

    let result = router
        .call_with_cancel(server, tool, arguments, &cancel)
        .await
        .with_context(|| format!("Call to {}.{} failed", server, tool))?;

    match result {
        ToolCallResult::Structured(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        ToolCallResult::Text(text) => println!("{}", text),
    }
    Ok(())
}

pub async fn orchestrate(config_path: &Path, task: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let router = stdio_router(config_path, &config, load_registry(&config)?);
    let orchestrator = Orchestrator::new(router, Arc::new(StandardAuditPlanner))
        .with_agent_marker(config.router.agent_marker.clone());

    let cancel = cancel_on_ctrl_c();
    let outcome = orchestrator
        .run_with_cancel(task.unwrap_or(DEFAULT_TASK), &cancel)
        .await
        .context("Orchestrated audit failed")?;

    println!("\n📋 Orchestrated audit {}", outcome.run_id);
    println!("   Plan: {}", outcome.plan.summary);
    for step in &outcome.steps {
        println!("   ✓ {}.{}", step.server, step.tool);
    }
    println!("   Findings: {}", outcome.findings.len());
    if let Some(path) = &outcome.findings_path {
        println!("   Findings JSON: {}", path);
    }
    if let Some(path) = &outcome.report_path {
        println!("   Markdown report: {}", path);
    }
    Ok(())
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling in-flight call");
            trigger.cancel();
        }
    });
    cancel
}
