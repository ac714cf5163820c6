//! User roster.
//!
//! Users are provided externally as a CSV roster with a header row:
//!
//! ```text
//! username,team,role
//! alice,finance,analyst
//! bob,sales,representative
//! ```
//!
//! Only `username` and `team` are used; other columns are ignored.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A user and the team whose policy applies to them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub team: String,
}

impl User {
    pub fn new(username: impl Into<String>, team: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            team: team.into(),
        }
    }
}

/// Errors raised while parsing a roster.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("roster is empty (expected a header row with 'username' and 'team')")]
    Empty,

    #[error("roster header is missing the '{0}' column")]
    MissingColumn(&'static str),

    #[error("roster line {line}: {reason}")]
    InvalidRow { line: usize, reason: String },

    #[error("roster line {line}: duplicate username '{username}'")]
    DuplicateUser { line: usize, username: String },
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(default)]
    username: String,
    #[serde(default)]
    team: String,
}

/// Parse a CSV roster into users, preserving file order.
///
/// Header names are matched case-insensitively and quoted fields may contain commas.
pub fn parse_roster(content: &str) -> Result<Vec<User>, RosterError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|err| invalid_row(1, err))?
        .iter()
        .map(str::to_ascii_lowercase)
        .collect::<csv::StringRecord>();
    if headers.iter().all(str::is_empty) {
        return Err(RosterError::Empty);
    }
    for column in ["username", "team"] {
        if !headers.iter().any(|h| h == column) {
            return Err(RosterError::MissingColumn(column));
        }
    }

    let mut users = Vec::new();
    let mut seen = HashSet::new();
    for result in reader.records() {
        let record = result.map_err(|err| {
            let line = err.position().map(|p| p.line() as usize).unwrap_or_default();
            invalid_row(line, err)
        })?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or_default();
        let row: RosterRow = record
            .deserialize(Some(&headers))
            .map_err(|err| invalid_row(line, err))?;

        let username = required(row.username, line, "username")?;
        let team = required(row.team, line, "team")?;

        if !seen.insert(username.clone()) {
            return Err(RosterError::DuplicateUser { line, username });
        }
        users.push(User::new(username, team));
    }

    Ok(users)
}

fn invalid_row(line: usize, err: csv::Error) -> RosterError {
    RosterError::InvalidRow {
        line,
        reason: err.to_string(),
    }
}

fn required(value: String, line: usize, name: &str) -> Result<String, RosterError> {
    if value.is_empty() {
        return Err(RosterError::InvalidRow {
            line,
            reason: format!("missing value for '{}'", name),
        });
    }
    Ok(value)
}
