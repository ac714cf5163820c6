//! Tool router: resolves a server, opens a session, calls one tool and
//! normalizes the result.

use crate::error::McpError;
use crate::invoker::{ToolInvoker, ToolSession};
use crate::protocol::CallToolResponse;
use crate::registry::ServerRegistry;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Normalized result of a tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallResult {
    Structured(Value),
    Text(String),
}

impl ToolCallResult {
    /// The result as JSON; text becomes a JSON string.
    pub fn into_value(self) -> Value {
        match self {
            Self::Structured(value) => value,
            Self::Text(text) => Value::String(text),
        }
    }

    /// Deserialize the result. Text results are parsed as JSON first.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match self {
            Self::Structured(value) => T::deserialize(value),
            Self::Text(text) => serde_json::from_str(text),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(_) => None,
        }
    }
}

/// Routes tool calls to capability servers through a [`ToolInvoker`].
#[derive(Clone)]
pub struct ToolRouter {
    registry: Arc<ServerRegistry>,
    invoker: Arc<dyn ToolInvoker>,
    timeout: Option<Duration>,
}

impl ToolRouter {
    pub fn new(registry: Arc<ServerRegistry>, invoker: Arc<dyn ToolInvoker>) -> Self {
        Self {
            registry,
            invoker,
            timeout: None,
        }
    }

    /// Bound session open plus call by `timeout`. `None` disables the bound.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    /// Call `tool` on `server` with `arguments`.
    pub async fn call(
        &self,
        server: &str,
        tool: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, McpError> {
        self.call_with_cancel(server, tool, arguments, &CancellationToken::new())
            .await
    }

    /// Call `tool` on `server`, aborting with [`McpError::Cancelled`] when
    /// `cancel` fires or the router deadline passes.
    pub async fn call_with_cancel(
        &self,
        server: &str,
        tool: &str,
        arguments: Value,
        cancel: &CancellationToken,
    ) -> Result<ToolCallResult, McpError> {
        let manifest = self.registry.get(server)?;
        if !manifest.exposes(tool) {
            return Err(McpError::ToolNotFound {
                server: server.to_string(),
                tool: tool.to_string(),
            });
        }

        let deadline = self.timeout.map(|t| Instant::now() + t);
        let guard = Guard {
            server,
            tool,
            deadline,
            cancel,
        };

        tracing::debug!(server = %server, tool = %tool, "Routing tool call");
        let mut session = guard.run(self.invoker.open(manifest)).await??;

        let outcome = guard.run(session.call_tool(tool, arguments)).await;
        match &outcome {
            // A request is still in flight; dropping the session tears it down.
            Err(McpError::Cancelled { .. }) => drop(session),
            _ => close(server, session.as_mut()).await,
        }

        let response = outcome??;
        normalize(server, tool, response)
    }
}

struct Guard<'a> {
    server: &'a str,
    tool: &'a str,
    deadline: Option<Instant>,
    cancel: &'a CancellationToken,
}

impl Guard<'_> {
    async fn run<F, T>(&self, future: F) -> Result<T, McpError>
    where
        F: Future<Output = T>,
    {
        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, future)
                    .await
                    .map_err(|_| "deadline exceeded"),
                None => Ok(future.await),
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err("cancelled by caller"),
            outcome = bounded => outcome,
        };

        outcome.map_err(|reason| {
            tracing::warn!(server = %self.server, tool = %self.tool, reason, "Tool call aborted");
            McpError::Cancelled {
                server: self.server.to_string(),
                tool: self.tool.to_string(),
                reason: reason.to_string(),
            }
        })
    }
}

async fn close(server: &str, session: &mut dyn ToolSession) {
    match tokio::time::timeout(SHUTDOWN_GRACE, session.shutdown()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(server = %server, error = %e, "Session shutdown failed"),
        Err(_) => tracing::debug!(server = %server, "Session shutdown timed out"),
    }
}

fn normalize(server: &str, tool: &str, response: CallToolResponse) -> Result<ToolCallResult, McpError> {
    if response.is_error == Some(true) {
        return Err(McpError::ToolInvocationError {
            server: server.to_string(),
            tool: tool.to_string(),
            message: response
                .joined_text()
                .unwrap_or_else(|| "tool reported an error".to_string()),
        });
    }

    if let Some(structured) = response.structured_content {
        return Ok(ToolCallResult::Structured(structured));
    }
    if let Some(text) = response.joined_text() {
        return Ok(ToolCallResult::Text(text));
    }
    Ok(ToolCallResult::Text(serde_json::to_string(&response)?))
}
