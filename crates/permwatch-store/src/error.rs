//! Error types for permission storage.

/// Errors raised by permission stores and the error injector.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store has not been initialized (e.g. audit before seeding).
    #[error("permission store {location} is unavailable: {reason}")]
    Unavailable { location: String, reason: String },

    /// A store reached through a capability server rejected or dropped the call.
    #[error("permission server '{server}' call failed: {source}")]
    Routing {
        server: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("user '{username}' not found in the permission store")]
    UserNotFound { username: String },

    #[error("invalid permission record: {reason}")]
    InvalidRecord { reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn unavailable(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            location: location.into(),
            reason: reason.into(),
        }
    }
}
