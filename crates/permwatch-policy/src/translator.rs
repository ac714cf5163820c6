//! Policy translation boundary.
//!
//! Turning natural-language policy text into an [`AccessPolicy`] is the job of
//! an external reasoning component. This module only fixes the contract such a
//! component must satisfy: whatever it produces is accepted only if it passes
//! the same structural validation as a loaded policy document.

use crate::error::PolicyError;
use crate::store::validate;
use async_trait::async_trait;
use permwatch_core::AccessPolicy;

/// Translates unstructured policy text into a structured access policy.
#[async_trait]
pub trait PolicyTranslator: Send + Sync {
    /// Name used in errors and logs.
    fn name(&self) -> &str;

    /// Produce a candidate policy from `policy_text`.
    async fn translate(&self, policy_text: &str) -> Result<AccessPolicy, PolicyError>;
}

/// Run a translator and accept its output only if it is structurally valid.
pub async fn accept_translation(
    translator: &dyn PolicyTranslator,
    policy_text: &str,
) -> Result<AccessPolicy, PolicyError> {
    let candidate = translator.translate(policy_text).await?;

    if !validate(&candidate) {
        let reason = candidate.structural_issues().join("; ");
        tracing::warn!(
            translator = translator.name(),
            reason = %reason,
            "Rejected policy translation"
        );
        return Err(PolicyError::SchemaInvalid {
            source_name: format!("translator {}", translator.name()),
            reason,
        });
    }

    tracing::info!(
        translator = translator.name(),
        teams = candidate.teams.len(),
        "Accepted policy translation"
    );
    Ok(candidate)
}
