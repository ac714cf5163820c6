//! # permwatch-audit
//!
//! Compares a declared access policy with the permissions users actually
//! hold and emits classified findings.
//!
//! ## Severity
//!
//! | Finding | Table | Severity |
//! |---------|-------|----------|
//! | unauthorized DELETE | sensitive | `CRITICAL` |
//! | unauthorized (other) | sensitive | `HIGH` |
//! | missing | any | `MEDIUM` |
//! | unauthorized | not sensitive | `LOW` |
//!
//! The sensitive-table set comes from [`permwatch_core::AuditConfig`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use permwatch_audit::AuditEngine;
//! use permwatch_core::{AccessPolicy, AuditConfig, User};
//! use permwatch_store::MemoryPermissionStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = AuditEngine::new(AuditConfig::with_sensitive_tables(["accounts"]));
//! let store = MemoryPermissionStore::new();
//! let findings = engine
//!     .audit(&AccessPolicy::default(), &[User::new("alice", "finance")], &store)
//!     .await?;
//! assert!(findings.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod diff;
pub mod engine;
pub mod error;
pub mod severity;

pub use diff::{FindingsDiff, Reclassified};
pub use engine::{AuditEngine, AuditRun, PolicyGap};
pub use error::AuditError;
pub use severity::classify;
