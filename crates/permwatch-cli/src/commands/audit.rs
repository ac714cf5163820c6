//! `permwatch audit`, `privileges` and `who-can` commands.

use super::{load_config, load_policy, load_users, parse_action};
use anyhow::{Context, Result};
use permwatch_audit::{AuditEngine, FindingsDiff};
use permwatch_core::{Findings, Severity};
use permwatch_runtime::render_markdown;
use permwatch_store::{PermissionStore, SqlitePermissionStore};
use std::fs;
use std::path::Path;

pub async fn run(
    config_path: &Path,
    output: Option<&Path>,
    markdown: Option<&Path>,
    previous: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let policy = load_policy(&config)?;
    let users = load_users(&config)?;
    let store = SqlitePermissionStore::open(&config.database).await?;

    let engine = AuditEngine::new(config.audit.clone());
    let run = engine.audit_run(&policy, &users, &store).await?;
    let findings = &run.findings;

    let json = serde_json::to_string_pretty(findings)?;
    match output {
        Some(path) => {
            write_file(path, &json)?;
            eprintln!("✓ Findings written to {}", path.display());
        }
        None => println!("{}", json),
    }

    if let Some(path) = markdown {
        write_file(path, &render_markdown(findings))?;
        eprintln!("✓ Markdown report written to {}", path.display());
    }

    eprintln!("\n📋 Audit {} ({} finding(s))", run.run_id, findings.len());
    for severity in Severity::DESCENDING {
        let count = findings.count_by_severity(severity);
        if count > 0 {
            eprintln!("   {}: {}", severity, count);
        }
    }
    for gap in &run.policy_gaps {
        eprintln!("   ⚠ {} skipped: team '{}' has no policy", gap.username, gap.team);
    }

    if let Some(path) = previous {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read previous findings {:?}", path))?;
        let previous: Findings = serde_json::from_str(&content)
            .with_context(|| format!("Invalid findings snapshot {:?}", path))?;
        print_diff(&FindingsDiff::between(&previous, findings));
    }

    Ok(())
}

fn print_diff(diff: &FindingsDiff) {
    if diff.is_unchanged() {
        eprintln!("\n↔ No change since the previous snapshot");
        return;
    }

    eprintln!("\n↔ Changes since the previous snapshot:");
    for finding in &diff.introduced {
        eprintln!("   + {} ({})", finding.id, finding.severity);
    }
    for finding in &diff.resolved {
        eprintln!("   - {} ({})", finding.id, finding.severity);
    }
    for change in &diff.reclassified {
        eprintln!("   ~ {} ({} → {})", change.id, change.previous, change.current);
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))
}

pub async fn privileges(config_path: &Path, username: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let store = SqlitePermissionStore::open(&config.database).await?;

    let granted = store.granted_permissions(username).await?;
    println!("{}", serde_json::to_string_pretty(&granted)?);
    Ok(())
}

pub async fn who_can(config_path: &Path, table: &str, action: &str) -> Result<()> {
    let action = parse_action(action)?;
    let config = load_config(config_path)?;
    let store = SqlitePermissionStore::open(&config.database).await?;

    for user in store.who_can(table, action).await? {
        println!("{}", user);
    }
    Ok(())
}
