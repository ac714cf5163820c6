use permwatch_mcp::McpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Mcp(#[from] McpError),

    #[error("planning failed: {0}")]
    Planning(String),

    #[error("plan is empty: {0}")]
    EmptyPlan(String),

    #[error("unexpected output from tool '{tool}' on server '{server}': {reason}")]
    UnexpectedOutput {
        server: String,
        tool: String,
        reason: String,
    },

    #[error("no step of the plan produced findings")]
    NoFindings,
}

impl RuntimeError {
    pub(crate) fn unexpected(server: &str, tool: &str, reason: impl ToString) -> Self {
        Self::UnexpectedOutput {
            server: server.to_string(),
            tool: tool.to_string(),
            reason: reason.to_string(),
        }
    }
}
