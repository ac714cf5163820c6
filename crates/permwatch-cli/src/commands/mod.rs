//! CLI command implementations.
//!
//! Every command starts from [`load_config`]; the helpers here turn the
//! configured locations into loaded components.

pub mod audit;
pub mod serve;
pub mod servers;
pub mod store;

use anyhow::{Context, Result};
use permwatch_core::{AccessPolicy, Action, PermwatchConfig, User, parse_roster};
use permwatch_mcp::{ServerManifest, ServerRegistry, StdioInvoker, ToolRouter};
use permwatch_policy::{PolicySource, PolicyStore};
use std::path::Path;
use std::sync::Arc;

/// Program name that manifests use to refer to this binary.
const SELF_PROGRAM: &str = "permwatch";

/// Environment variable holding the configuration file path.
pub const CONFIG_ENV: &str = "PERMWATCH_CONFIG";

/// Load the configuration file, or defaults relative to the working directory
/// when it does not exist.
pub fn load_config(path: &Path) -> Result<PermwatchConfig> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "Configuration file not found, using defaults");
        return Ok(PermwatchConfig::default().resolved_against(Path::new(".")));
    }

    PermwatchConfig::load_with_context(path)
        .with_context(|| format!("Failed to load configuration from {:?}", path))
}

pub fn load_policy(config: &PermwatchConfig) -> Result<AccessPolicy> {
    let store = PolicyStore::load(PolicySource::file(&config.policy_file))
        .with_context(|| format!("Failed to load access policy from {:?}", config.policy_file))?;
    Ok(store.into_policy())
}

pub fn load_users(config: &PermwatchConfig) -> Result<Vec<User>> {
    let content = std::fs::read_to_string(&config.users_file)
        .with_context(|| format!("Failed to read user roster {:?}", config.users_file))?;
    parse_roster(&content)
        .with_context(|| format!("Invalid user roster {:?}", config.users_file))
}

pub fn parse_action(action: &str) -> Result<Action> {
    action
        .to_uppercase()
        .parse()
        .with_context(|| format!("Invalid action {:?}", action))
}

/// Load the server registry, pointing `permwatch` commands at this executable.
pub fn load_registry(config: &PermwatchConfig) -> Result<ServerRegistry> {
    let registry = ServerRegistry::load(&config.servers_file)
        .with_context(|| format!("Failed to load server registry {:?}", config.servers_file))?;

    let Ok(exe) = std::env::current_exe() else {
        return Ok(registry);
    };
    let manifests: Vec<ServerManifest> = registry
        .list()
        .cloned()
        .map(|m| self_hosted(m, &exe.display().to_string()))
        .collect();
    Ok(ServerRegistry::from_manifests(manifests)?)
}

fn self_hosted(mut manifest: ServerManifest, exe: &str) -> ServerManifest {
    if manifest.command.first().is_some_and(|p| p == SELF_PROGRAM) {
        manifest.command[0] = exe.to_string();
    }
    manifest
}

/// Router that spawns capability servers as child processes.
///
/// Children inherit the configuration file through `PERMWATCH_CONFIG`.
pub fn stdio_router(
    config_path: &Path,
    config: &PermwatchConfig,
    registry: ServerRegistry,
) -> ToolRouter {
    let mut invoker = StdioInvoker::new();
    if config_path.exists() {
        let absolute = std::path::absolute(config_path).unwrap_or_else(|_| config_path.to_path_buf());
        invoker = invoker.with_env(CONFIG_ENV, absolute.display().to_string());
    }
    ToolRouter::new(Arc::new(registry), Arc::new(invoker)).with_timeout(config.router.timeout())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(command: &[&str]) -> ServerManifest {
        ServerManifest {
            id: "db_server".to_string(),
            name: "Database Server".to_string(),
            description: String::new(),
            command: command.iter().map(|s| s.to_string()).collect(),
            tools: vec![],
        }
    }

    #[test]
    fn test_self_hosted_rewrites_only_own_program() {
        let rewritten = self_hosted(manifest(&["permwatch", "serve", "db"]), "/opt/bin/permwatch");
        assert_eq!(rewritten.command, vec!["/opt/bin/permwatch", "serve", "db"]);

        let untouched = self_hosted(manifest(&["python", "-m", "db"]), "/opt/bin/permwatch");
        assert_eq!(untouched.command[0], "python");
    }

    #[test]
    fn test_parse_action_is_case_insensitive() {
        assert_eq!(parse_action("delete").unwrap(), Action::Delete);
        assert!(parse_action("drop").is_err());
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("permwatch.yaml")).unwrap();
        assert_eq!(config.router.timeout_secs, 60);
    }
}
