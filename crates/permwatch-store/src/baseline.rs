//! Baseline permissions: exactly what the policy expects, nothing more.

use crate::error::StoreError;
use crate::store::PermissionWriter;
use permwatch_core::{AccessPolicy, PermissionRecord, User};

/// Granted records matching the policy for every user whose team has an entry.
///
/// Users whose team is absent from the policy get no records.
pub fn baseline_records(policy: &AccessPolicy, users: &[User]) -> Vec<PermissionRecord> {
    let mut records = Vec::new();
    for user in users {
        let Some(expected) = policy.expected_permissions(&user.team) else {
            tracing::debug!(
                user = %user.username,
                team = %user.team,
                "No policy entry for team, no baseline permissions"
            );
            continue;
        };

        for (table, actions) in expected {
            for action in actions {
                records.push(PermissionRecord::granted(
                    &user.username,
                    &user.team,
                    table.clone(),
                    action,
                ));
            }
        }
    }
    records
}

/// Write the baseline into a store, replacing whatever it held.
///
/// Returns the number of records written.
pub async fn seed<W>(writer: &W, policy: &AccessPolicy, users: &[User]) -> Result<usize, StoreError>
where
    W: PermissionWriter + ?Sized,
{
    let records = baseline_records(policy, users);
    writer.replace_all(&records).await?;

    tracing::info!(
        users = users.len(),
        records = records.len(),
        "Seeded baseline permissions"
    );
    Ok(records.len())
}
