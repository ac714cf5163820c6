//! Configuration types for permwatch.
//!
//! Configuration is loaded from a single YAML file (`permwatch.yaml` by
//! convention). Every file location the system touches is explicit here and
//! handed to the component constructors; nothing reads fixed paths.
//!
//! ```yaml
//! policy_file: data/policy/access_config.yaml
//! users_file: data/users/users.csv
//! database: data/audit.db
//! servers_file: data/mcp_servers.yaml
//! audit:
//!   sensitive_tables: [accounts, transactions]
//! router:
//!   timeout_secs: 30
//! ```

pub mod audit;
pub mod router;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use audit::AuditConfig;
pub use router::RouterConfig;

/// Complete permwatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermwatchConfig {
    /// Declared access policy (YAML, root key `teams`).
    #[serde(default = "default_policy_file")]
    pub policy_file: PathBuf,

    /// Natural-language policy text the access policy was derived from.
    #[serde(default = "default_policy_text_file")]
    pub policy_text_file: PathBuf,

    /// User roster (CSV with `username` and `team` columns).
    #[serde(default = "default_users_file")]
    pub users_file: PathBuf,

    /// SQLite database holding granted permissions.
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Capability server manifest (YAML, root key `servers`).
    #[serde(default = "default_servers_file")]
    pub servers_file: PathBuf,

    /// Root directory the filesystem capability server is confined to.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    /// Directory for findings and reports, relative to `workspace_root`.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,

    /// Audit engine settings.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Tool routing settings.
    #[serde(default)]
    pub router: RouterConfig,
}

impl Default for PermwatchConfig {
    fn default() -> Self {
        Self {
            policy_file: default_policy_file(),
            policy_text_file: default_policy_text_file(),
            users_file: default_users_file(),
            database: default_database(),
            servers_file: default_servers_file(),
            workspace_root: default_workspace_root(),
            reports_dir: default_reports_dir(),
            audit: AuditConfig::default(),
            router: RouterConfig::default(),
        }
    }
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PermwatchConfig {
    /// Load configuration from a YAML file without resolving paths.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration and resolve relative paths against the directory
    /// containing the configuration file.
    pub fn load_with_context(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = Self::from_file(path)?;

        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(config.resolved_against(&base_dir))
    }

    /// Resolve every relative path against `base_dir`.
    ///
    /// `reports_dir` stays relative to `workspace_root`.
    pub fn resolved_against(mut self, base_dir: &Path) -> Self {
        let resolve = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                base_dir.join(p)
            }
        };

        self.policy_file = resolve(&self.policy_file);
        self.policy_text_file = resolve(&self.policy_text_file);
        self.users_file = resolve(&self.users_file);
        self.database = resolve(&self.database);
        self.servers_file = resolve(&self.servers_file);
        self.workspace_root = resolve(&self.workspace_root);
        self
    }

    /// Absolute (or workspace-relative) reports directory.
    pub fn reports_path(&self) -> PathBuf {
        if self.reports_dir.is_absolute() {
            self.reports_dir.clone()
        } else {
            self.workspace_root.join(&self.reports_dir)
        }
    }
}

fn default_policy_file() -> PathBuf {
    PathBuf::from("data/policy/access_config.yaml")
}

fn default_policy_text_file() -> PathBuf {
    PathBuf::from("data/policy/policy.txt")
}

fn default_users_file() -> PathBuf {
    PathBuf::from("data/users/users.csv")
}

fn default_database() -> PathBuf {
    PathBuf::from("data/audit.db")
}

fn default_servers_file() -> PathBuf {
    PathBuf::from("data/mcp_servers.yaml")
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = PermwatchConfig::from_yaml("").unwrap();
        assert_eq!(config.database, PathBuf::from("data/audit.db"));
        assert!(config.audit.sensitive_tables.is_empty());
        assert_eq!(config.router.timeout_secs, 60);
    }

    #[test]
    fn test_parse_sensitive_tables_and_router() {
        let config = PermwatchConfig::from_yaml(
            r#"
database: state/perms.db
audit:
  sensitive_tables: [accounts, transactions]
router:
  timeout_secs: 5
"#,
        )
        .unwrap();

        assert!(config.audit.is_sensitive("accounts"));
        assert!(!config.audit.is_sensitive("orders"));
        assert_eq!(config.router.timeout_secs, 5);
        assert_eq!(config.router.agent_marker, "_agent");
        assert_eq!(config.database, PathBuf::from("state/perms.db"));
    }

    #[test]
    fn test_resolved_against_base_dir() {
        let config = PermwatchConfig {
            database: PathBuf::from("/var/lib/permwatch.db"),
            ..Default::default()
        }
        .resolved_against(Path::new("/etc/permwatch"));

        assert_eq!(
            config.policy_file,
            PathBuf::from("/etc/permwatch/data/policy/access_config.yaml")
        );
        assert_eq!(config.database, PathBuf::from("/var/lib/permwatch.db"));
        assert_eq!(config.reports_path(), PathBuf::from("/etc/permwatch/./reports"));
    }

    #[test]
    fn test_unknown_field_type_is_error() {
        let err = PermwatchConfig::from_yaml("router:\n  timeout_secs: soon\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }
}
