//! SQLite-backed permission store.
//!
//! Permissions live in one table:
//!
//! ```sql
//! permissions(id, username, team, table_name, action, granted)
//! UNIQUE(username, table_name, action)
//! ```
//!
//! `granted` is stored as an integer 0/1.

use crate::error::StoreError;
use crate::store::{PermissionStore, PermissionWriter, sort_records};
use async_trait::async_trait;
use permwatch_core::{Action, PermissionMap, PermissionRecord};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::str::FromStr;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS permissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    team TEXT NOT NULL,
    table_name TEXT NOT NULL,
    action TEXT NOT NULL,
    granted INTEGER NOT NULL,
    UNIQUE(username, table_name, action)
)
"#;

const UPSERT: &str = r#"
INSERT INTO permissions (username, team, table_name, action, granted)
VALUES (?, ?, ?, ?, ?)
ON CONFLICT(username, table_name, action)
DO UPDATE SET team = excluded.team, granted = excluded.granted
"#;

const NOT_SEEDED: &str = "run `permwatch seed` first";

/// Permission store backed by a SQLite database.
#[derive(Debug, Clone)]
pub struct SqlitePermissionStore {
    pool: SqlitePool,
    location: String,
}

impl SqlitePermissionStore {
    /// Open an existing, seeded database.
    ///
    /// Fails with [`StoreError::Unavailable`] if the file does not exist or the
    /// `permissions` table has not been created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let location = path.display().to_string();

        if !path.exists() {
            return Err(StoreError::unavailable(
                location,
                format!("database file does not exist; {}", NOT_SEEDED),
            ));
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool, location };
        if !store.is_initialized().await? {
            return Err(StoreError::unavailable(
                &store.location,
                format!("permissions table is missing; {}", NOT_SEEDED),
            ));
        }

        tracing::debug!(database = %store.location, "Opened permission store");
        Ok(store)
    }

    /// Open (creating if needed) a database and ensure the schema exists.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            location: path.display().to_string(),
        };
        store.init_schema().await?;
        Ok(store)
    }

    /// A fresh in-memory database with the schema created.
    pub async fn in_memory() -> Result<Self, StoreError> {
        // One long-lived connection: every new connection would see an empty database.
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            location: ":memory:".to_string(),
        };
        store.init_schema().await?;
        Ok(store)
    }

    /// Where this store lives (file path or `:memory:`).
    pub fn location(&self) -> &str {
        &self.location
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    async fn is_initialized(&self) -> Result<bool, StoreError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(1) FROM sqlite_master WHERE type = 'table' AND name = 'permissions'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0 > 0)
    }

    /// Map a missing `permissions` table to [`StoreError::Unavailable`].
    fn classify(&self, err: sqlx::Error) -> StoreError {
        let missing_table = err
            .as_database_error()
            .map(|db| db.message().contains("no such table"))
            .unwrap_or(false);

        if missing_table {
            StoreError::unavailable(
                &self.location,
                format!("permissions table is missing; {}", NOT_SEEDED),
            )
        } else {
            StoreError::Database(err)
        }
    }
}

fn parse_action(literal: &str) -> Result<Action, StoreError> {
    Action::from_str(literal).map_err(|e| StoreError::InvalidRecord {
        reason: e.to_string(),
    })
}

#[async_trait]
impl PermissionStore for SqlitePermissionStore {
    async fn granted_permissions(&self, username: &str) -> Result<PermissionMap, StoreError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT table_name, action FROM permissions WHERE username = ? AND granted = 1",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| self.classify(e))?;

        let mut granted = PermissionMap::new();
        for (table, action) in rows {
            granted.entry(table).or_default().insert(parse_action(&action)?);
        }
        Ok(granted)
    }

    async fn who_can(&self, table: &str, action: Action) -> Result<BTreeSet<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT username FROM permissions WHERE table_name = ? AND action = ? AND granted = 1",
        )
        .bind(table)
        .bind(action.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| self.classify(e))?;

        Ok(rows.into_iter().map(|(username,)| username).collect())
    }

    async fn list_tables(&self) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }
}

#[async_trait]
impl PermissionWriter for SqlitePermissionStore {
    async fn team_of(&self, username: &str) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT team FROM permissions WHERE username = ? ORDER BY id LIMIT 1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| self.classify(e))?;

        Ok(row.map(|(team,)| team))
    }

    async fn upsert(&self, record: &PermissionRecord) -> Result<(), StoreError> {
        sqlx::query(UPSERT)
            .bind(&record.username)
            .bind(&record.team)
            .bind(&record.table)
            .bind(record.action.as_str())
            .bind(i64::from(record.granted))
            .execute(&self.pool)
            .await
            .map_err(|e| self.classify(e))?;
        Ok(())
    }

    async fn set_granted(
        &self,
        username: &str,
        table: &str,
        action: Action,
        granted: bool,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE permissions SET granted = ? WHERE username = ? AND table_name = ? AND action = ?",
        )
        .bind(i64::from(granted))
        .bind(username)
        .bind(table)
        .bind(action.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| self.classify(e))?;

        Ok(result.rows_affected())
    }

    async fn replace_all(&self, records: &[PermissionRecord]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM permissions")
            .execute(&mut *tx)
            .await
            .map_err(|e| self.classify(e))?;

        for record in records {
            sqlx::query(UPSERT)
                .bind(&record.username)
                .bind(&record.team)
                .bind(&record.table)
                .bind(record.action.as_str())
                .bind(i64::from(record.granted))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn all_records(&self) -> Result<Vec<PermissionRecord>, StoreError> {
        let rows: Vec<(String, String, String, String, i64)> = sqlx::query_as(
            "SELECT username, team, table_name, action, granted FROM permissions",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| self.classify(e))?;

        let mut records = rows
            .into_iter()
            .map(|(username, team, table, action, granted)| -> Result<_, StoreError> {
                Ok(PermissionRecord {
                    username,
                    team,
                    table,
                    action: parse_action(&action)?,
                    granted: granted != 0,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        sort_records(&mut records);
        Ok(records)
    }
}
