//! Capability server runtime.
//!
//! An [`McpServer`] exposes the tools of one [`ToolProvider`] over
//! newline-delimited JSON-RPC. It answers `initialize`, `tools/list`,
//! `tools/call`, `ping` and `shutdown`; notifications get no response.

use crate::error::McpError;
use crate::protocol::*;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Output of a successful tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Machine-readable result, sent as `structuredContent` (and as text).
    Structured(Value),
    /// Plain text result.
    Text(String),
}

/// Failure of a tool call inside a provider.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Failed(String),
}

impl ToolError {
    pub fn failed(err: impl std::fmt::Display) -> Self {
        Self::Failed(err.to_string())
    }
}

/// The tools a capability server implements.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Definitions advertised through `tools/list`.
    fn tools(&self) -> Vec<ToolDefinition>;

    /// Run one tool.
    async fn call(&self, tool: &str, arguments: Value) -> Result<ToolOutput, ToolError>;
}

/// JSON-RPC front end for a [`ToolProvider`].
pub struct McpServer {
    info: ServerInfo,
    /// Served tools by name.
    tools: BTreeMap<String, ToolDefinition>,
    provider: Arc<dyn ToolProvider>,
}

impl McpServer {
    /// Create a server named `name` for `provider`.
    pub fn new(name: impl Into<String>, provider: Arc<dyn ToolProvider>) -> Self {
        let tools = provider
            .tools()
            .into_iter()
            .map(|tool| (tool.name.clone(), tool))
            .collect();
        Self {
            info: ServerInfo {
                name: name.into(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            tools,
            provider,
        }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Whether this server serves `tool`.
    pub fn serves(&self, tool: &str) -> bool {
        self.tools.contains_key(tool)
    }

    /// Names of all served tools, sorted.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Serve requests on stdin/stdout until EOF or `shutdown`.
    pub async fn serve_stdio(&self) -> Result<(), McpError> {
        tracing::info!(server = %self.info.name, "Starting capability server on stdio");
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve requests from `reader`, writing responses to `writer`, until EOF
    /// or `shutdown`.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<(), McpError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(line) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!(server = %self.info.name, error = %e, "Unparseable request");
                    let response = JsonRpcResponse::error(
                        None,
                        error_codes::PARSE_ERROR,
                        format!("Parse error: {}", e),
                    );
                    write_message(&mut writer, &response).await?;
                    continue;
                }
            };

            let is_shutdown = request.method == "shutdown";
            let expects_response = request.id.is_some();
            let response = self.handle_request(request).await;

            if expects_response {
                write_message(&mut writer, &response).await?;
            }
            if is_shutdown {
                break;
            }
        }

        tracing::debug!(server = %self.info.name, "Capability server stopped");
        Ok(())
    }

    /// Handle a JSON-RPC request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "initialized" | "notifications/initialized" => JsonRpcResponse::success(id, json!({})),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => self.handle_call_tool(id, request.params).await,
            "shutdown" => self.handle_shutdown(id),
            _ => JsonRpcResponse::error(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        let result = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": self.info,
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            }
        });
        JsonRpcResponse::success(id, result)
    }

    fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        let response = ListToolsResponse {
            tools: self.tools.values().cloned().collect(),
        };
        match serde_json::to_value(response) {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, e.to_string()),
        }
    }

    async fn handle_call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(
                        id,
                        error_codes::INVALID_PARAMS,
                        format!("Invalid params: {}", e),
                    );
                }
            },
            None => return JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, "Missing params"),
        };

        if !self.tools.contains_key(&params.name) {
            return tool_not_found(id, &params.name);
        }

        tracing::debug!(server = %self.info.name, tool = %params.name, "Calling tool");
        let response = match self.provider.call(&params.name, params.arguments).await {
            Ok(ToolOutput::Structured(value)) => CallToolResponse {
                content: vec![ToolContent::text(value.to_string())],
                structured_content: Some(value),
                is_error: Some(false),
            },
            Ok(ToolOutput::Text(text)) => CallToolResponse {
                content: vec![ToolContent::text(text)],
                structured_content: None,
                is_error: Some(false),
            },
            Err(ToolError::UnknownTool(name)) => return tool_not_found(id, &name),
            Err(ToolError::InvalidArguments(reason)) => {
                return JsonRpcResponse::error_with_data(
                    id,
                    error_codes::INVALID_PARAMS,
                    format!("Invalid arguments for tool {}: {}", params.name, reason),
                    Some(json!({ "kind": "invalid_arguments" })),
                );
            }
            Err(ToolError::Failed(message)) => {
                tracing::warn!(
                    server = %self.info.name,
                    tool = %params.name,
                    error = %message,
                    "Tool failed"
                );
                CallToolResponse {
                    content: vec![ToolContent::text(message)],
                    structured_content: None,
                    is_error: Some(true),
                }
            }
        };

        match serde_json::to_value(response) {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, e.to_string()),
        }
    }

    fn handle_shutdown(&self, id: Option<Value>) -> JsonRpcResponse {
        tracing::info!(server = %self.info.name, "Capability server shutdown requested");
        JsonRpcResponse::success(id, Value::Null)
    }
}

fn tool_not_found(id: Option<Value>, tool: &str) -> JsonRpcResponse {
    JsonRpcResponse::error_with_data(
        id,
        error_codes::INVALID_PARAMS,
        format!("Unknown tool: {}", tool),
        Some(json!({ "kind": TOOL_NOT_FOUND_KIND })),
    )
}

/// Write one message as a JSON line and flush.
pub(crate) async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), McpError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl ToolProvider for Echo {
        fn tools(&self) -> Vec<ToolDefinition> {
            vec![
                ToolDefinition::new("echo", "Echo arguments", json!({"type": "object"})),
                ToolDefinition::new("fail", "Always fails", json!({"type": "object"})),
            ]
        }

        async fn call(&self, tool: &str, arguments: Value) -> Result<ToolOutput, ToolError> {
            match tool {
                "echo" => Ok(ToolOutput::Structured(arguments)),
                "fail" => Err(ToolError::Failed("boom".to_string())),
                other => Err(ToolError::UnknownTool(other.to_string())),
            }
        }
    }

    fn server() -> McpServer {
        McpServer::new("echo_server", Arc::new(Echo))
    }

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest::new(1, method, params)
    }

    #[tokio::test]
    async fn test_initialize() {
        let response = server().handle_request(request("initialize", None)).await;
        let result = response.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "echo_server");
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn test_list_tools() {
        let response = server().handle_request(request("tools/list", None)).await;
        let tools: ListToolsResponse = serde_json::from_value(response.result.unwrap()).unwrap();
        let names: Vec<_> = tools.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["echo", "fail"]);
    }

    #[tokio::test]
    async fn test_call_structured() {
        let response = server()
            .handle_request(request(
                "tools/call",
                Some(json!({"name": "echo", "arguments": {"a": 1}})),
            ))
            .await;

        let result: CallToolResponse = serde_json::from_value(response.result.unwrap()).unwrap();
        assert_eq!(result.structured_content, Some(json!({"a": 1})));
        assert_eq!(result.is_error, Some(false));
    }

    #[tokio::test]
    async fn test_call_nonexistent_tool() {
        let response = server()
            .handle_request(request(
                "tools/call",
                Some(json!({"name": "nonexistent", "arguments": {}})),
            ))
            .await;

        let error = response.error.unwrap();
        assert_eq!(error.code, error_codes::INVALID_PARAMS);
        assert_eq!(error.data.unwrap()["kind"], TOOL_NOT_FOUND_KIND);
    }

    #[tokio::test]
    async fn test_failed_tool_is_error_result() {
        let response = server()
            .handle_request(request("tools/call", Some(json!({"name": "fail"}))))
            .await;

        let result: CallToolResponse = serde_json::from_value(response.result.unwrap()).unwrap();
        assert_eq!(result.is_error, Some(true));
        assert_eq!(result.joined_text().as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let response = server().handle_request(request("resources/list", None)).await;
        assert_eq!(response.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_skips_notifications_and_stops_on_shutdown() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n",
            "not json\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"shutdown"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#,
            "\n",
        );
        let mut output = Vec::new();
        server().serve(input.as_bytes(), &mut output).await.unwrap();

        let responses: Vec<JsonRpcResponse> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0].id, Some(json!(1)));
        assert_eq!(responses[1].error.as_ref().unwrap().code, error_codes::PARSE_ERROR);
        assert_eq!(responses[2].id, Some(json!(2)));
    }
}
