//! # permwatch-mcp
//!
//! Capability server plumbing for permwatch.
//!
//! Capability servers are independent programs that expose named tools over
//! newline-delimited JSON-RPC (MCP-style `initialize`, `tools/list`,
//! `tools/call`). This crate provides:
//!
//! - [`ServerRegistry`]: the manifest of known servers
//! - [`ToolRouter`]: one call, one session, normalized result
//! - [`StdioInvoker`] and [`InMemoryInvoker`]: how sessions are opened
//! - [`McpServer`]: the server side, wrapping a [`ToolProvider`]

pub mod error;
pub mod invoker;
pub mod memory;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod server;
pub mod stdio;
pub mod transport;

pub use error::McpError;
pub use invoker::{RpcSession, ToolInvoker, ToolSession, classify_remote_error};
pub use memory::InMemoryInvoker;
pub use protocol::{CallToolResponse, ToolContent, ToolDefinition};
pub use registry::{AGENT_MARKER, ServerManifest, ServerRegistry};
pub use router::{ToolCallResult, ToolRouter};
pub use server::{McpServer, ToolError, ToolOutput, ToolProvider};
pub use stdio::StdioInvoker;
pub use transport::JsonRpcConnection;
