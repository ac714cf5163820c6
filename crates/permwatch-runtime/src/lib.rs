//! # permwatch-runtime
//!
//! The capability servers permwatch ships ([`capabilities`]), the router-backed
//! permission store the auditor reads through, and the orchestration layer
//! that plans an audit, runs it and persists the report.

pub mod capabilities;
pub mod error;
pub mod orchestrator;
pub mod planner;
pub mod report;
pub mod routed;

pub use capabilities::{
    AUDITOR_AGENT, AuditorCapability, DB_SERVER, DbCapability, FS_SERVER, FsCapability,
};
pub use error::RuntimeError;
pub use orchestrator::{Orchestration, Orchestrator, StepRecord};
pub use planner::{DEFAULT_TASK, Plan, PlanStep, Planner, StandardAuditPlanner};
pub use report::render_markdown;
pub use routed::RoutedPermissionStore;
