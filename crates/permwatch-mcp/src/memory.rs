//! In-process invoker backed by [`McpServer`]s.
//!
//! Each session gets its own duplex pipe and server task, so the full
//! JSON-RPC exchange runs without spawning processes.

use crate::error::McpError;
use crate::invoker::{RpcSession, ToolInvoker, ToolSession};
use crate::protocol::CallToolResponse;
use crate::registry::ServerManifest;
use crate::server::McpServer;
use crate::transport::JsonRpcConnection;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;

const PIPE_CAPACITY: usize = 64 * 1024;

/// Routes sessions to in-process servers bound by server id.
#[derive(Default)]
pub struct InMemoryInvoker {
    servers: HashMap<String, Arc<McpServer>>,
    open: Arc<AtomicUsize>,
}

impl InMemoryInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `server` to `manifest.id`.
    ///
    /// Fails with [`McpError::ToolMismatch`] when the manifest names tools
    /// the server does not serve.
    pub fn bind(&mut self, manifest: &ServerManifest, server: Arc<McpServer>) -> Result<(), McpError> {
        let missing: Vec<String> = manifest
            .tools
            .iter()
            .filter(|t| !server.serves(t))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(McpError::ToolMismatch {
                server: manifest.id.clone(),
                missing,
            });
        }

        self.servers.insert(manifest.id.clone(), server);
        Ok(())
    }

    /// Number of sessions currently open.
    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolInvoker for InMemoryInvoker {
    async fn open(&self, manifest: &ServerManifest) -> Result<Box<dyn ToolSession>, McpError> {
        let server = self
            .servers
            .get(&manifest.id)
            .cloned()
            .ok_or_else(|| McpError::ServerNotFound {
                server: manifest.id.clone(),
            })?;

        let (client, remote) = tokio::io::duplex(PIPE_CAPACITY);
        let task = tokio::spawn(async move {
            let (read, write) = tokio::io::split(remote);
            if let Err(e) = server.serve(BufReader::new(read), write).await {
                tracing::debug!(server = %server.name(), error = %e, "In-memory server stopped");
            }
        });

        // Counted before the handshake so a failed start still releases.
        let guard = SessionGuard::new(self.open.clone(), task);

        let (read, write) = tokio::io::split(client);
        let connection = JsonRpcConnection::new(manifest.id.clone(), BufReader::new(read), write);
        let inner = RpcSession::start(connection).await?;

        Ok(Box::new(InMemorySession {
            inner,
            _guard: guard,
        }))
    }
}

struct SessionGuard {
    open: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl SessionGuard {
    fn new(open: Arc<AtomicUsize>, task: JoinHandle<()>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self { open, task }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.task.abort();
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

struct InMemorySession {
    inner: RpcSession<BufReader<ReadHalf<DuplexStream>>, WriteHalf<DuplexStream>>,
    _guard: SessionGuard,
}

#[async_trait]
impl ToolSession for InMemorySession {
    async fn call_tool(
        &mut self,
        tool: &str,
        arguments: Value,
    ) -> Result<CallToolResponse, McpError> {
        self.inner.call_tool(tool, arguments).await
    }

    async fn shutdown(&mut self) -> Result<(), McpError> {
        self.inner.shutdown().await
    }
}
