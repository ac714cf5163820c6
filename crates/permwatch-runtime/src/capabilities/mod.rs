//! Capability servers shipped with permwatch.
//!
//! Each server enumerates its tools as a Rust enum and implements
//! [`ToolProvider`](permwatch_mcp::ToolProvider); wrap it in an
//! [`McpServer`](permwatch_mcp::McpServer) to serve it.

pub mod auditor;
pub mod db;
pub mod fs;

pub use auditor::{AuditorCapability, AuditorTool};
pub use db::{DbCapability, DbTool};
pub use fs::{FsCapability, FsTool};

use permwatch_mcp::ToolError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Registry id of the database server.
pub const DB_SERVER: &str = "db_server";
/// Registry id of the filesystem server.
pub const FS_SERVER: &str = "fs_server";
/// Registry id of the auditor agent.
pub const AUDITOR_AGENT: &str = "db_auditor_agent";

/// Deserialize tool arguments; a missing argument object reads as `{}`.
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}
