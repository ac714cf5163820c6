//! Error types for the audit crate.

use permwatch_store::StoreError;
use thiserror::Error;

/// Errors that abort an audit run.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Reading a user's permissions failed.
    #[error("failed to read permissions for user '{username}': {source}")]
    Store {
        username: String,
        #[source]
        source: StoreError,
    },
}
