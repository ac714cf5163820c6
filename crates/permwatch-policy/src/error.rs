//! Error types for policy loading.

use std::fmt;
use std::path::PathBuf;

/// Where a policy document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicySource {
    /// A YAML file on disk.
    File(PathBuf),
    /// An in-memory document with a display name (e.g. a translator's output).
    Inline { name: String, content: String },
}

impl PolicySource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn inline(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Inline {
            name: name.into(),
            content: content.into(),
        }
    }
}

impl fmt::Display for PolicySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Inline { name, .. } => write!(f, "<{}>", name),
        }
    }
}

/// Errors raised while loading or accepting an access policy.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("policy not found: {source_name}")]
    NotFound {
        source_name: String,
        #[source]
        cause: std::io::Error,
    },

    #[error("policy {source_name} is malformed: {reason}")]
    Malformed { source_name: String, reason: String },

    #[error("policy {source_name} does not match the policy schema: {reason}")]
    SchemaInvalid { source_name: String, reason: String },
}

impl PolicyError {
    pub(crate) fn schema_invalid(source: &PolicySource, reason: impl Into<String>) -> Self {
        Self::SchemaInvalid {
            source_name: source.to_string(),
            reason: reason.into(),
        }
    }
}
