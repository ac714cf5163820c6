//! Access policy loading and validation.
//!
//! [`PolicyStore`] loads the declared access policy (teams → allowed
//! table/action pairs) from YAML and rejects documents that do not match the
//! policy shape. [`PolicyTranslator`] is the boundary for components that
//! derive a policy from natural-language text.

pub mod error;
pub mod store;
pub mod translator;

pub use error::{PolicyError, PolicySource};
pub use store::{PolicyStore, load_policy, validate};
pub use translator::{PolicyTranslator, accept_translation};
