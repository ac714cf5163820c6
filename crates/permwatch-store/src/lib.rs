//! Granted-permission storage for permwatch.
//!
//! [`PermissionStore`] is the read side used by the audit engine.
//! [`PermissionWriter`] adds the mutations needed for seeding and for
//! [`ErrorInjector`]. Two backends implement both: [`SqlitePermissionStore`]
//! and [`MemoryPermissionStore`].

pub mod baseline;
pub mod error;
pub mod injector;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use baseline::{baseline_records, seed};
pub use error::StoreError;
pub use injector::ErrorInjector;
pub use memory::MemoryPermissionStore;
pub use sqlite::SqlitePermissionStore;
pub use store::{PermissionStore, PermissionWriter};
