//! Tool router configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for routing tool calls to capability servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Deadline for one tool call (session open + invocation), in seconds.
    /// `0` disables the deadline.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Server id prefix/infix identifying specialist agent servers.
    #[serde(default = "default_agent_marker")]
    pub agent_marker: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            agent_marker: default_agent_marker(),
        }
    }
}

impl RouterConfig {
    /// The per-call deadline, if enabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_agent_marker() -> String {
    "_agent".to_string()
}
