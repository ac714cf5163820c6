//! Capability server registry.
//!
//! The registry is loaded once from a YAML manifest and is read-only
//! afterwards:
//!
//! ```yaml
//! servers:
//!   db_server:
//!     name: Database Server
//!     description: Read-only access to granted permissions
//!     command: [permwatch, serve, db]
//!     tools: [db_list_tables, db_get_privileges, db_who_can]
//! ```

use crate::error::McpError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Server ids containing this marker are specialist agents.
pub const AGENT_MARKER: &str = "_agent";

/// Declarative description of one capability server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerManifest {
    /// Registry key; filled in at load time.
    #[serde(skip)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Program and arguments that start the server.
    pub command: Vec<String>,
    /// Tool names the server exposes. Empty means undeclared.
    #[serde(default)]
    pub tools: Vec<String>,
}

impl ServerManifest {
    /// Whether a call to `tool` may be routed to this server.
    ///
    /// A manifest that declares no tools defers the decision to the server.
    pub fn exposes(&self, tool: &str) -> bool {
        self.tools.is_empty() || self.tools.iter().any(|t| t == tool)
    }

    fn validate(&self) -> Result<(), String> {
        if self.command.is_empty() || self.command[0].trim().is_empty() {
            return Err(format!("server '{}' has an empty command", self.id));
        }

        let mut seen = HashSet::new();
        for tool in &self.tools {
            if tool.trim().is_empty() {
                return Err(format!("server '{}' lists a blank tool name", self.id));
            }
            if !seen.insert(tool.as_str()) {
                return Err(format!("server '{}' lists tool '{}' twice", self.id, tool));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    servers: Option<BTreeMap<String, ServerManifest>>,
}

/// All known capability servers, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ServerRegistry {
    servers: BTreeMap<String, ServerManifest>,
}

impl ServerRegistry {
    /// Load the registry from a YAML manifest file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, McpError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                McpError::RegistryNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                McpError::RegistryMalformed {
                    source_name: path.display().to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let registry = Self::from_yaml(&path.display().to_string(), &content)?;
        tracing::debug!(
            path = %path.display(),
            servers = registry.servers.len(),
            "Loaded server registry"
        );
        Ok(registry)
    }

    /// Parse a registry from YAML content. `source_name` appears in errors.
    pub fn from_yaml(source_name: &str, content: &str) -> Result<Self, McpError> {
        let malformed = |reason: String| McpError::RegistryMalformed {
            source_name: source_name.to_string(),
            reason,
        };

        if content.trim().is_empty() {
            return Err(malformed("document is empty".to_string()));
        }

        let document: RegistryDocument =
            serde_yaml::from_str(content).map_err(|e| malformed(e.to_string()))?;
        let servers = document
            .servers
            .ok_or_else(|| malformed("missing 'servers' root key".to_string()))?;

        Self::from_manifests(servers.into_iter().map(|(id, mut manifest)| {
            manifest.id = id;
            manifest
        }))
        .map_err(|e| match e {
            McpError::RegistryMalformed { reason, .. } => malformed(reason),
            other => other,
        })
    }

    /// Build a registry from manifests whose `id` is already set.
    pub fn from_manifests(
        manifests: impl IntoIterator<Item = ServerManifest>,
    ) -> Result<Self, McpError> {
        let mut servers = BTreeMap::new();
        for manifest in manifests {
            manifest
                .validate()
                .map_err(|reason| McpError::RegistryMalformed {
                    source_name: "<manifests>".to_string(),
                    reason,
                })?;
            servers.insert(manifest.id.clone(), manifest);
        }
        Ok(Self { servers })
    }

    /// Look up a server by id.
    pub fn get(&self, server_id: &str) -> Result<&ServerManifest, McpError> {
        self.servers
            .get(server_id)
            .ok_or_else(|| McpError::ServerNotFound {
                server: server_id.to_string(),
            })
    }

    /// All servers, ordered by id.
    pub fn list(&self) -> impl Iterator<Item = &ServerManifest> {
        self.servers.values()
    }

    /// Servers matching `predicate`, ordered by id.
    pub fn list_by_predicate<P>(&self, predicate: P) -> Vec<&ServerManifest>
    where
        P: Fn(&ServerManifest) -> bool,
    {
        self.servers.values().filter(|m| predicate(m)).collect()
    }

    /// Specialist agent servers (ids containing `_agent`).
    pub fn agent_servers(&self) -> Vec<&ServerManifest> {
        self.agent_servers_marked(AGENT_MARKER)
    }

    /// Agent servers identified by a custom id marker.
    pub fn agent_servers_marked(&self, marker: &str) -> Vec<&ServerManifest> {
        self.list_by_predicate(|m| m.id.contains(marker))
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
servers:
  fs_server:
    name: Filesystem Server
    description: Workspace files
    command: [permwatch, serve, fs]
    tools: [fs_read_file, fs_write_file]
  db_auditor_agent:
    name: Database Auditor
    description: Runs the audit
    command: [permwatch, serve, auditor]
    tools: [audit_database]
  db_server:
    name: Database Server
    command: [permwatch, serve, db]
"#;

    #[test]
    fn test_load_and_get() {
        let registry = ServerRegistry::from_yaml("test", MANIFEST).unwrap();

        assert_eq!(registry.len(), 3);
        let fs = registry.get("fs_server").unwrap();
        assert_eq!(fs.id, "fs_server");
        assert_eq!(fs.command, vec!["permwatch", "serve", "fs"]);
        assert!(fs.exposes("fs_read_file"));
        assert!(!fs.exposes("db_who_can"));
    }

    #[test]
    fn test_undeclared_tools_defer_to_server() {
        let registry = ServerRegistry::from_yaml("test", MANIFEST).unwrap();
        assert!(registry.get("db_server").unwrap().exposes("anything"));
    }

    #[test]
    fn test_unknown_server() {
        let registry = ServerRegistry::from_yaml("test", MANIFEST).unwrap();
        assert!(matches!(
            registry.get("mail_server"),
            Err(McpError::ServerNotFound { server }) if server == "mail_server"
        ));
    }

    #[test]
    fn test_agent_servers() {
        let registry = ServerRegistry::from_yaml("test", MANIFEST).unwrap();
        let ids: Vec<&str> = registry.agent_servers().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["db_auditor_agent"]);

        let db: Vec<&str> = registry
            .list_by_predicate(|m| m.id.starts_with("db_"))
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(db, vec!["db_auditor_agent", "db_server"]);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServerRegistry::load(dir.path().join("mcp_servers.yaml")).unwrap_err();
        assert!(matches!(err, McpError::RegistryNotFound { .. }));
    }

    #[test]
    fn test_malformed_documents() {
        for content in [
            "",
            "other: {}\n",
            "servers: [a, b]\n",
            "servers:\n  x:\n    name: X\n    command: []\n",
            "servers:\n  x:\n    name: X\n    command: [x]\n    tools: [a, a]\n",
            "servers:\n  x:\n    name: X\n    command: [x]\n    tools: [' ']\n",
        ] {
            let err = ServerRegistry::from_yaml("bad.yaml", content).unwrap_err();
            match err {
                McpError::RegistryMalformed { source_name, .. } => {
                    assert_eq!(source_name, "bad.yaml")
                }
                other => panic!("unexpected error for {content:?}: {other:?}"),
            }
        }
    }
}
