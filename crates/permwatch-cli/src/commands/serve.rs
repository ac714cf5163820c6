//! `permwatch serve` runs one capability server on stdin/stdout.

use super::{load_config, load_registry, stdio_router};
use crate::ServeTarget;
use anyhow::{Context, Result};
use permwatch_audit::AuditEngine;
use permwatch_mcp::{McpServer, ToolProvider};
use permwatch_runtime::{AUDITOR_AGENT, AuditorCapability, DB_SERVER, DbCapability, FS_SERVER, FsCapability};
use permwatch_store::SqlitePermissionStore;
use std::path::Path;
use std::sync::Arc;

pub async fn run(config_path: &Path, target: ServeTarget) -> Result<()> {
    let config = load_config(config_path)?;

    let (name, provider): (&str, Arc<dyn ToolProvider>) = match target {
        ServeTarget::Db => {
            let store = SqlitePermissionStore::open(&config.database)
                .await
                .with_context(|| format!("Failed to open permission database {:?}", config.database))?;
            let provider: Arc<dyn ToolProvider> = Arc::new(DbCapability::new(Arc::new(store)));
            (DB_SERVER, provider)
        }
        ServeTarget::Fs => {
            let provider: Arc<dyn ToolProvider> = Arc::new(FsCapability::from_config(&config));
            (FS_SERVER, provider)
        }
        ServeTarget::Auditor => {
            let router = stdio_router(config_path, &config, load_registry(&config)?);
            let engine = AuditEngine::new(config.audit.clone());
            let provider: Arc<dyn ToolProvider> = Arc::new(AuditorCapability::new(router, engine));
            (AUDITOR_AGENT, provider)
        }
    };

    McpServer::new(name, provider)
        .serve_stdio()
        .await
        .with_context(|| format!("Capability server {} failed", name))
}
