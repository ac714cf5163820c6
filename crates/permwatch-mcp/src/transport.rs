//! Newline-delimited JSON-RPC client connection.

use crate::error::McpError;
use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION};
use crate::server::write_message;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite};

/// One client side of a JSON-RPC line protocol.
pub struct JsonRpcConnection<R, W> {
    server: String,
    reader: R,
    writer: W,
    next_id: u64,
}

impl<R, W> JsonRpcConnection<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(server: impl Into<String>, reader: R, writer: W) -> Self {
        Self {
            server: server.into(),
            reader,
            writer,
            next_id: 1,
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Send a request and wait for the response carrying the same id.
    ///
    /// The outer result is the transport; the inner one is the remote outcome.
    pub async fn request(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Result<Value, JsonRpcError>, McpError> {
        let id = self.next_id;
        self.next_id += 1;

        let request = JsonRpcRequest::new(id, method, params);
        write_message(&mut self.writer, &request)
            .await
            .map_err(|e| McpError::transport(&self.server, format!("write failed: {}", e)))?;

        let expected = Value::from(id);
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(|e| McpError::transport(&self.server, format!("read failed: {}", e)))?;
            if read == 0 {
                return Err(McpError::transport(
                    &self.server,
                    format!("connection closed while waiting for '{}'", method),
                ));
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let response: JsonRpcResponse = serde_json::from_str(trimmed).map_err(|e| {
                McpError::transport(&self.server, format!("invalid response: {}", e))
            })?;

            // A null-id error is the server rejecting a request it could not parse,
            // and only one request is outstanding at a time.
            let unaddressed = matches!(response.id, None | Some(Value::Null));
            if unaddressed && response.error.is_some() {
                tracing::debug!(server = %self.server, method, "Null-id error answers the pending request");
            } else if response.id.as_ref() != Some(&expected) {
                tracing::debug!(server = %self.server, id = ?response.id, "Skipping unrelated message");
                continue;
            }

            return Ok(match response.error {
                Some(error) => Err(error),
                None => Ok(response.result.unwrap_or(Value::Null)),
            });
        }
    }

    /// Send a notification. No response is expected.
    pub async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let notification = JsonRpcRequest::notification(method, params);
        write_message(&mut self.writer, &notification)
            .await
            .map_err(|e| McpError::transport(&self.server, format!("write failed: {}", e)))
    }

    /// Perform the `initialize` handshake.
    pub async fn initialize(&mut self) -> Result<Value, McpError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "permwatch",
                "version": env!("CARGO_PKG_VERSION"),
            }
        });

        let result = self.request("initialize", Some(params)).await?.map_err(|e| {
            McpError::transport(&self.server, format!("initialize rejected: {}", e.message))
        })?;
        self.notify("notifications/initialized", None).await?;

        tracing::debug!(server = %self.server, "Session initialized");
        Ok(result)
    }
}
