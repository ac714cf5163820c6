//! Filesystem capability server.
//!
//! Reads policy inputs and writes findings and reports. Every caller-supplied
//! path is resolved inside the workspace root; paths that escape it are
//! rejected. Configured input locations are trusted as given.

use super::{object_schema, parse_args};
use async_trait::async_trait;
use permwatch_core::{Findings, PermwatchConfig};
use permwatch_mcp::{ToolDefinition, ToolError, ToolOutput, ToolProvider};
use permwatch_policy::{PolicySource, load_policy};
use serde::Deserialize;
use serde_json::{Value, json};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsTool {
    ReadFile,
    WriteFile,
    ReadPolicy,
    WriteAccessConfig,
    ReadAccessConfig,
    ReadUsersCsv,
    WriteFindingsJson,
    WriteReportMarkdown,
}

impl FsTool {
    pub const ALL: [FsTool; 8] = [
        FsTool::ReadFile,
        FsTool::WriteFile,
        FsTool::ReadPolicy,
        FsTool::WriteAccessConfig,
        FsTool::ReadAccessConfig,
        FsTool::ReadUsersCsv,
        FsTool::WriteFindingsJson,
        FsTool::WriteReportMarkdown,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FsTool::ReadFile => "fs_read_file",
            FsTool::WriteFile => "fs_write_file",
            FsTool::ReadPolicy => "fs_read_policy",
            FsTool::WriteAccessConfig => "fs_write_access_config",
            FsTool::ReadAccessConfig => "fs_read_access_config",
            FsTool::ReadUsersCsv => "fs_read_users_csv",
            FsTool::WriteFindingsJson => "fs_write_findings_json",
            FsTool::WriteReportMarkdown => "fs_write_report_markdown",
        }
    }

    fn definition(&self) -> ToolDefinition {
        let string = json!({"type": "string"});
        let (description, schema) = match self {
            FsTool::ReadFile => (
                "Read a file inside the workspace",
                object_schema(json!({"path": string}), &["path"]),
            ),
            FsTool::WriteFile => (
                "Write a file inside the workspace, creating parent directories",
                object_schema(json!({"path": string, "content": string}), &["path", "content"]),
            ),
            FsTool::ReadPolicy => (
                "Read the natural-language policy text",
                object_schema(json!({}), &[]),
            ),
            FsTool::WriteAccessConfig => (
                "Validate and write the access policy YAML",
                object_schema(json!({"config_yaml": string}), &["config_yaml"]),
            ),
            FsTool::ReadAccessConfig => (
                "Read the access policy YAML",
                object_schema(json!({}), &[]),
            ),
            FsTool::ReadUsersCsv => ("Read the user roster CSV", object_schema(json!({}), &[])),
            FsTool::WriteFindingsJson => (
                "Validate and write a Findings JSON document (default reports/findings.json)",
                object_schema(
                    json!({"findings_json": string, "path": string}),
                    &["findings_json"],
                ),
            ),
            FsTool::WriteReportMarkdown => (
                "Write a Markdown audit report (default reports/audit-YYYYMMDD.md)",
                object_schema(json!({"markdown": string, "path": string}), &["markdown"]),
            ),
        };
        ToolDefinition::new(self.name(), description, schema)
    }
}

impl FromStr for FsTool {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| ToolError::UnknownTool(s.to_string()))
    }
}

#[derive(Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Deserialize)]
struct WriteArgs {
    path: String,
    content: String,
}

#[derive(Deserialize)]
struct AccessConfigArgs {
    config_yaml: String,
}

#[derive(Deserialize)]
struct FindingsArgs {
    findings_json: String,
    path: Option<String>,
}

#[derive(Deserialize)]
struct MarkdownArgs {
    markdown: String,
    path: Option<String>,
}

/// Serves [`FsTool`]s confined to a workspace root.
#[derive(Debug, Clone)]
pub struct FsCapability {
    root: PathBuf,
    reports_dir: PathBuf,
    policy_file: PathBuf,
    policy_text_file: PathBuf,
    users_file: PathBuf,
}

impl FsCapability {
    /// A filesystem server rooted at `root` with the default data layout.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = clean_root(root.into());
        Self {
            reports_dir: PathBuf::from("reports"),
            policy_file: root.join("data/policy/access_config.yaml"),
            policy_text_file: root.join("data/policy/policy.txt"),
            users_file: root.join("data/users/users.csv"),
            root,
        }
    }

    /// A filesystem server using the locations in `config`.
    pub fn from_config(config: &PermwatchConfig) -> Self {
        Self {
            root: clean_root(config.workspace_root.clone()),
            reports_dir: config.reports_dir.clone(),
            policy_file: config.policy_file.clone(),
            policy_text_file: config.policy_text_file.clone(),
            users_file: config.users_file.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a caller-supplied path inside the workspace root.
    pub fn confine(&self, requested: &str) -> Result<PathBuf, ToolError> {
        let escape = || ToolError::InvalidArguments(format!("path '{}' escapes the workspace", requested));

        let requested_path = Path::new(requested);
        let relative = if requested_path.is_absolute() {
            requested_path.strip_prefix(&self.root).map_err(|_| escape())?
        } else {
            requested_path
        };

        let mut clean = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => clean.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !clean.pop() {
                        return Err(escape());
                    }
                }
                Component::RootDir | Component::Prefix(_) => return Err(escape()),
            }
        }

        if clean.as_os_str().is_empty() {
            return Err(ToolError::InvalidArguments(format!("path '{}' names no file", requested)));
        }
        Ok(self.root.join(clean))
    }

    fn display(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }

    fn default_report_path(&self, file_name: &str) -> PathBuf {
        let dir = if self.reports_dir.is_absolute() {
            self.reports_dir.clone()
        } else {
            self.root.join(&self.reports_dir)
        };
        dir.join(file_name)
    }

    async fn read(&self, path: &Path) -> Result<ToolOutput, ToolError> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(ToolOutput::Text(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ToolError::Failed(format!(
                "File not found: {}",
                self.display(path)
            ))),
            Err(e) => Err(ToolError::Failed(format!(
                "Failed to read {}: {}",
                self.display(path),
                e
            ))),
        }
    }

    async fn write(&self, path: &Path, content: &str) -> Result<ToolOutput, ToolError> {
        let failed = |e: std::io::Error| {
            ToolError::Failed(format!("Failed to write {}: {}", self.display(path), e))
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(failed)?;
        }
        tokio::fs::write(path, content).await.map_err(failed)?;

        tracing::info!(path = %path.display(), bytes = content.len(), "Wrote file");
        Ok(ToolOutput::Structured(json!({
            "path": self.display(path),
            "bytes": content.len(),
        })))
    }
}

#[async_trait]
impl ToolProvider for FsCapability {
    fn tools(&self) -> Vec<ToolDefinition> {
        FsTool::ALL.iter().map(FsTool::definition).collect()
    }

    async fn call(&self, tool: &str, arguments: Value) -> Result<ToolOutput, ToolError> {
        match tool.parse::<FsTool>()? {
            FsTool::ReadFile => {
                let args: PathArgs = parse_args(arguments)?;
                self.read(&self.confine(&args.path)?).await
            }
            FsTool::WriteFile => {
                let args: WriteArgs = parse_args(arguments)?;
                self.write(&self.confine(&args.path)?, &args.content).await
            }
            FsTool::ReadPolicy => self.read(&self.policy_text_file).await,
            FsTool::ReadAccessConfig => self.read(&self.policy_file).await,
            FsTool::ReadUsersCsv => self.read(&self.users_file).await,
            FsTool::WriteAccessConfig => {
                let args: AccessConfigArgs = parse_args(arguments)?;
                let source = PolicySource::inline("config_yaml", args.config_yaml.as_str());
                load_policy(&source).map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
                self.write(&self.policy_file, &args.config_yaml).await
            }
            FsTool::WriteFindingsJson => {
                let args: FindingsArgs = parse_args(arguments)?;
                serde_json::from_str::<Findings>(&args.findings_json).map_err(|e| {
                    ToolError::InvalidArguments(format!("not a Findings document: {}", e))
                })?;
                let path = match args.path {
                    Some(path) => self.confine(&path)?,
                    None => self.default_report_path("findings.json"),
                };
                self.write(&path, &args.findings_json).await
            }
            FsTool::WriteReportMarkdown => {
                let args: MarkdownArgs = parse_args(arguments)?;
                let path = match args.path {
                    Some(path) => self.confine(&path)?,
                    None => {
                        let date = chrono::Local::now().format("%Y%m%d");
                        self.default_report_path(&format!("audit-{}.md", date))
                    }
                };
                self.write(&path, &args.markdown).await
            }
        }
    }
}

fn clean_root(root: PathBuf) -> PathBuf {
    let cleaned: PathBuf = root
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn capability() -> (tempfile::TempDir, FsCapability) {
        let dir = tempfile::tempdir().unwrap();
        let fs = FsCapability::new(dir.path());
        (dir, fs)
    }

    #[test]
    fn test_confine() {
        let (dir, fs) = capability();

        assert_eq!(fs.confine("reports/a.md").unwrap(), dir.path().join("reports/a.md"));
        assert_eq!(fs.confine("./x/../y.txt").unwrap(), dir.path().join("y.txt"));
        assert_eq!(
            fs.confine(&dir.path().join("z.txt").display().to_string()).unwrap(),
            dir.path().join("z.txt")
        );

        for bad in ["../outside.txt", "a/../../b", "/etc/passwd", ".", ""] {
            assert!(
                matches!(fs.confine(bad), Err(ToolError::InvalidArguments(_))),
                "{bad}"
            );
        }
    }

    #[tokio::test]
    async fn test_write_then_read_file() {
        let (_dir, fs) = capability();

        let written = fs
            .call("fs_write_file", json!({"path": "notes/a.txt", "content": "hello"}))
            .await
            .unwrap();
        assert_eq!(
            written,
            ToolOutput::Structured(json!({"path": "notes/a.txt", "bytes": 5}))
        );

        let read = fs
            .call("fs_read_file", json!({"path": "notes/a.txt"}))
            .await
            .unwrap();
        assert_eq!(read, ToolOutput::Text("hello".to_string()));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let (_dir, fs) = capability();
        let err = fs.call("fs_read_users_csv", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Failed(m) if m.starts_with("File not found")));
    }

    #[tokio::test]
    async fn test_access_config_is_validated() {
        let (dir, fs) = capability();

        let err = fs
            .call("fs_write_access_config", json!({"config_yaml": "teams:\n  x:\n    - table: t\n      actions: [DROP]\n"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));

        let yaml = "teams:\n  finance:\n    - table: accounts\n      actions: [SELECT]\n";
        fs.call("fs_write_access_config", json!({"config_yaml": yaml}))
            .await
            .unwrap();
        let stored = std::fs::read_to_string(dir.path().join("data/policy/access_config.yaml")).unwrap();
        assert_eq!(stored, yaml);
    }

    #[tokio::test]
    async fn test_findings_default_path() {
        let (dir, fs) = capability();
        let findings = serde_json::to_string(&Findings::new(vec![])).unwrap();

        fs.call("fs_write_findings_json", json!({"findings_json": findings}))
            .await
            .unwrap();
        assert!(dir.path().join("reports/findings.json").exists());

        let err = fs
            .call("fs_write_findings_json", json!({"findings_json": "{}"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_markdown_default_path_is_dated() {
        let (dir, fs) = capability();
        fs.call("fs_write_report_markdown", json!({"markdown": "# Report"}))
            .await
            .unwrap();

        let name = format!("audit-{}.md", chrono::Local::now().format("%Y%m%d"));
        assert!(dir.path().join("reports").join(name).exists());
    }
}
