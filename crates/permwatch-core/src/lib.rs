//! Shared data model for permwatch.
//!
//! Access policies, user rosters, stored permission records and audit findings
//! live here so that every other crate agrees on one set of types.

// Configuration types shared across all permwatch crates
pub mod config;

pub mod finding;
pub mod permission;
pub mod policy;
pub mod user;

pub use config::{AuditConfig, ConfigError, PermwatchConfig, RouterConfig};
pub use finding::{Finding, FindingType, Findings, Severity};
pub use permission::PermissionRecord;
pub use policy::{AccessPolicy, Action, PermissionMap, TablePermission, UnknownAction};
pub use user::{RosterError, User, parse_roster};
