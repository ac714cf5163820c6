//! Error types for the MCP crate.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading the registry or routing tool calls.
#[derive(Debug, Error)]
pub enum McpError {
    /// The server manifest file does not exist.
    #[error("server registry not found: {path}")]
    RegistryNotFound { path: PathBuf },

    /// The server manifest could not be parsed or failed validation.
    #[error("server registry {source_name} is malformed: {reason}")]
    RegistryMalformed { source_name: String, reason: String },

    /// No server with this id is registered.
    #[error("capability server not found: {server}")]
    ServerNotFound { server: String },

    /// The server does not expose the requested tool.
    #[error("tool '{tool}' not found on server '{server}'")]
    ToolNotFound { server: String, tool: String },

    /// The tool ran and reported an error.
    #[error("tool '{tool}' on server '{server}' failed: {message}")]
    ToolInvocationError {
        server: String,
        tool: String,
        message: String,
    },

    /// The call was cancelled by the caller or hit its deadline.
    #[error("call to tool '{tool}' on server '{server}' cancelled: {reason}")]
    Cancelled {
        server: String,
        tool: String,
        reason: String,
    },

    /// The server process could not be started.
    #[error("failed to spawn capability server '{server}': {source}")]
    SpawnFailed {
        server: String,
        #[source]
        source: std::io::Error,
    },

    /// The connection to a server broke or carried an invalid message.
    #[error("transport error for server '{server}': {message}")]
    Transport { server: String, message: String },

    /// A manifest names tools its bound server does not serve.
    #[error("server '{server}' does not serve manifest tools: {}", .missing.join(", "))]
    ToolMismatch { server: String, missing: Vec<String> },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl McpError {
    pub(crate) fn transport(server: &str, message: impl Into<String>) -> Self {
        Self::Transport {
            server: server.to_string(),
            message: message.into(),
        }
    }
}
