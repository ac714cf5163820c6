//! `permwatch seed` and `permwatch inject` commands.

use super::{load_config, load_policy, load_users, parse_action};
use anyhow::{Context, Result};
use permwatch_store::{ErrorInjector, PermissionWriter, SqlitePermissionStore, seed as seed_store};
use std::path::Path;

/// Create the database if needed and write the baseline.
pub async fn seed(config_path: &Path, reset: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let policy = load_policy(&config)?;
    let users = load_users(&config)?;

    let store = SqlitePermissionStore::create(&config.database)
        .await
        .with_context(|| format!("Failed to create permission database {:?}", config.database))?;

    let existing = store.all_records().await?.len();
    if existing > 0 && !reset {
        println!(
            "Database {} already holds {} record(s); use --reset to replace them",
            config.database.display(),
            existing
        );
        return Ok(());
    }

    let written = seed_store(&store, &policy, &users).await?;
    println!(
        "✓ Seeded {} permission record(s) for {} user(s) into {}",
        written,
        users.len(),
        config.database.display()
    );
    Ok(())
}

async fn open_store(config_path: &Path) -> Result<SqlitePermissionStore> {
    let config = load_config(config_path)?;
    SqlitePermissionStore::open(&config.database)
        .await
        .with_context(|| format!("Failed to open permission database {:?}", config.database))
}

pub async fn grant(config_path: &Path, username: &str, table: &str, action: &str) -> Result<()> {
    let action = parse_action(action)?;
    let store = open_store(config_path).await?;

    ErrorInjector::new(&store)
        .grant_excess(username, table, action)
        .await
        .with_context(|| format!("Failed to grant {} on {} to {}", action, table, username))?;

    println!("✓ Granted {} on {} to {}", action, table, username);
    Ok(())
}

pub async fn revoke(config_path: &Path, username: &str, table: &str, action: &str) -> Result<()> {
    let action = parse_action(action)?;
    let store = open_store(config_path).await?;

    let changed = ErrorInjector::new(&store)
        .revoke_required(username, table, action)
        .await?;

    if changed {
        println!("✓ Revoked {} on {} from {}", action, table, username);
    } else {
        println!("No {} grant on {} for {}; nothing changed", action, table, username);
    }
    Ok(())
}

pub async fn reset(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let policy = load_policy(&config)?;
    let users = load_users(&config)?;
    let store = open_store(config_path).await?;

    let written = ErrorInjector::new(&store)
        .reset_to_baseline(&policy, &users)
        .await?;
    println!("✓ Reset to baseline ({} record(s))", written);
    Ok(())
}
