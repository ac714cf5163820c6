//! Audit engine configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Configuration for the audit engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Tables whose unauthorized access escalates severity
    /// (e.g. tables holding monetary or transactional state).
    #[serde(default)]
    pub sensitive_tables: BTreeSet<String>,
}

impl AuditConfig {
    /// Build a config from a list of sensitive tables.
    pub fn with_sensitive_tables<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sensitive_tables: tables.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if a table is sensitive.
    pub fn is_sensitive(&self, table: &str) -> bool {
        self.sensitive_tables.contains(table)
    }
}
