//! Subprocess invoker: one child process per session.

use crate::error::McpError;
use crate::invoker::{RpcSession, ToolInvoker, ToolSession};
use crate::protocol::CallToolResponse;
use crate::registry::ServerManifest;
use crate::transport::JsonRpcConnection;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

const EXIT_GRACE: Duration = Duration::from_secs(2);

/// Spawns `manifest.command` and speaks JSON-RPC over its stdin/stdout.
#[derive(Debug, Clone, Default)]
pub struct StdioInvoker {
    workdir: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl StdioInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run server processes in `dir`.
    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// Set an environment variable for server processes.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

#[async_trait]
impl ToolInvoker for StdioInvoker {
    async fn open(&self, manifest: &ServerManifest) -> Result<Box<dyn ToolSession>, McpError> {
        let Some((program, args)) = manifest.command.split_first() else {
            return Err(McpError::SpawnFailed {
                server: manifest.id.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            });
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            command.current_dir(dir);
        }
        command.envs(self.envs.iter().map(|(k, v)| (k, v)));

        let mut child = command.spawn().map_err(|source| McpError::SpawnFailed {
            server: manifest.id.clone(),
            source,
        })?;
        tracing::debug!(server = %manifest.id, program = %program, "Spawned capability server");

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(McpError::transport(&manifest.id, "child stdio not captured"));
        };

        let connection = JsonRpcConnection::new(manifest.id.clone(), BufReader::new(stdout), stdin);
        let inner = RpcSession::start(connection).await?;

        Ok(Box::new(StdioSession {
            server: manifest.id.clone(),
            inner,
            child: Some(child),
        }))
    }
}

struct StdioSession {
    server: String,
    inner: RpcSession<BufReader<ChildStdout>, ChildStdin>,
    child: Option<Child>,
}

#[async_trait]
impl ToolSession for StdioSession {
    async fn call_tool(
        &mut self,
        tool: &str,
        arguments: Value,
    ) -> Result<CallToolResponse, McpError> {
        self.inner.call_tool(tool, arguments).await
    }

    async fn shutdown(&mut self) -> Result<(), McpError> {
        self.inner.shutdown().await?;

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(server = %self.server, %status, "Capability server exited");
            }
            Ok(Err(e)) => {
                tracing::warn!(server = %self.server, error = %e, "Failed to reap capability server");
            }
            Err(_) => {
                tracing::warn!(server = %self.server, "Capability server did not exit, killing");
                child.kill().await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_failure_names_server() {
        let manifest = ServerManifest {
            id: "ghost_server".to_string(),
            name: "Ghost".to_string(),
            description: String::new(),
            command: vec!["/nonexistent/permwatch-ghost".to_string()],
            tools: vec![],
        };

        let err = match StdioInvoker::new().open(&manifest).await {
            Ok(_) => panic!("spawn should fail"),
            Err(e) => e,
        };
        assert!(matches!(err, McpError::SpawnFailed { server, .. } if server == "ghost_server"));
    }
}
