//! Session seam between the router and capability servers.

use crate::error::McpError;
use crate::protocol::{CallToolResponse, JsonRpcError, TOOL_NOT_FOUND_KIND};
use crate::registry::ServerManifest;
use crate::transport::JsonRpcConnection;
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncWrite};

/// An open, exclusive connection to one capability server.
#[async_trait]
pub trait ToolSession: Send {
    /// Invoke `tool` with `arguments`.
    async fn call_tool(&mut self, tool: &str, arguments: Value)
    -> Result<CallToolResponse, McpError>;

    /// Close the session. Safe to call more than once.
    async fn shutdown(&mut self) -> Result<(), McpError>;
}

/// Opens sessions to capability servers described by manifests.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn open(&self, manifest: &ServerManifest) -> Result<Box<dyn ToolSession>, McpError>;
}

/// JSON-RPC session over any line transport.
pub struct RpcSession<R, W> {
    connection: Option<JsonRpcConnection<R, W>>,
    server: String,
}

impl<R, W> RpcSession<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Wrap `connection` and perform the `initialize` handshake.
    pub async fn start(mut connection: JsonRpcConnection<R, W>) -> Result<Self, McpError> {
        connection.initialize().await?;
        Ok(Self {
            server: connection.server().to_string(),
            connection: Some(connection),
        })
    }

    fn connection(&mut self) -> Result<&mut JsonRpcConnection<R, W>, McpError> {
        let server = &self.server;
        self.connection
            .as_mut()
            .ok_or_else(|| McpError::transport(server, "session already closed"))
    }
}

#[async_trait]
impl<R, W> ToolSession for RpcSession<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn call_tool(
        &mut self,
        tool: &str,
        arguments: Value,
    ) -> Result<CallToolResponse, McpError> {
        let server = self.server.clone();
        let params = json!({ "name": tool, "arguments": arguments });

        match self.connection()?.request("tools/call", Some(params)).await? {
            Ok(result) => serde_json::from_value(result).map_err(|e| {
                McpError::transport(&server, format!("invalid tools/call result: {}", e))
            }),
            Err(error) => Err(classify_remote_error(&server, tool, error)),
        }
    }

    async fn shutdown(&mut self) -> Result<(), McpError> {
        let Some(mut connection) = self.connection.take() else {
            return Ok(());
        };
        // The server may already be gone; either way the connection is dropped.
        if let Err(e) = connection.request("shutdown", None).await {
            tracing::debug!(server = %self.server, error = %e, "Shutdown request failed");
        }
        Ok(())
    }
}

/// Map a JSON-RPC error from `tools/call` to a routing error.
pub fn classify_remote_error(server: &str, tool: &str, error: JsonRpcError) -> McpError {
    let kind = error
        .data
        .as_ref()
        .and_then(|d| d.get("kind"))
        .and_then(Value::as_str);

    let not_found = kind == Some(TOOL_NOT_FOUND_KIND)
        || error.message.starts_with("Tool not found")
        || error.message.starts_with("Unknown tool");

    if not_found {
        McpError::ToolNotFound {
            server: server.to_string(),
            tool: tool.to_string(),
        }
    } else {
        McpError::ToolInvocationError {
            server: server.to_string(),
            tool: tool.to_string(),
            message: error.message,
        }
    }
}
