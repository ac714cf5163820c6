//! Loading access policies from YAML documents.
//!
//! Loading happens in two phases. The document is first parsed into a generic
//! YAML tree (failure there is [`PolicyError::Malformed`]), then its shape is
//! checked by hand so every violation can name the offending team and entry
//! (failure there is [`PolicyError::SchemaInvalid`]).

use crate::error::{PolicyError, PolicySource};
use permwatch_core::{AccessPolicy, Action, TablePermission};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;

/// Owns one loaded access policy together with the source it came from.
#[derive(Debug, Clone)]
pub struct PolicyStore {
    source: PolicySource,
    policy: AccessPolicy,
}

impl PolicyStore {
    /// Load and validate the policy at `source`.
    pub fn load(source: PolicySource) -> Result<Self, PolicyError> {
        let policy = load_policy(&source)?;
        Ok(Self { source, policy })
    }

    pub fn source(&self) -> &PolicySource {
        &self.source
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn into_policy(self) -> AccessPolicy {
        self.policy
    }
}

/// Load an access policy without keeping the store around.
pub fn load_policy(source: &PolicySource) -> Result<AccessPolicy, PolicyError> {
    let content = read_source(source)?;

    let document: Value =
        serde_yaml::from_str(&content).map_err(|e| PolicyError::Malformed {
            source_name: source.to_string(),
            reason: e.to_string(),
        })?;

    let policy = parse_document(source, &document)?;

    let issues = policy.structural_issues();
    if !issues.is_empty() {
        return Err(PolicyError::schema_invalid(source, issues.join("; ")));
    }

    tracing::debug!(
        source = %source,
        teams = policy.teams.len(),
        "Loaded access policy"
    );
    Ok(policy)
}

/// Re-check structural invariants of a policy built outside [`load_policy`].
pub fn validate(policy: &AccessPolicy) -> bool {
    policy.structural_issues().is_empty()
}

fn read_source(source: &PolicySource) -> Result<String, PolicyError> {
    match source {
        PolicySource::Inline { content, .. } => Ok(content.clone()),
        PolicySource::File(path) => fs::read_to_string(path).map_err(|cause| {
            if cause.kind() == ErrorKind::NotFound {
                PolicyError::NotFound {
                    source_name: source.to_string(),
                    cause,
                }
            } else {
                PolicyError::Malformed {
                    source_name: source.to_string(),
                    reason: cause.to_string(),
                }
            }
        }),
    }
}

fn parse_document(source: &PolicySource, document: &Value) -> Result<AccessPolicy, PolicyError> {
    let root = match document {
        Value::Mapping(root) => root,
        Value::Null => return Err(PolicyError::schema_invalid(source, "document is empty")),
        _ => {
            return Err(PolicyError::schema_invalid(
                source,
                "document root must be a mapping",
            ));
        }
    };

    let teams = match root.get("teams") {
        Some(Value::Mapping(teams)) => teams,
        Some(_) => {
            return Err(PolicyError::schema_invalid(source, "'teams' must be a mapping"));
        }
        None => {
            return Err(PolicyError::schema_invalid(source, "missing 'teams' root key"));
        }
    };

    let mut parsed = BTreeMap::new();
    for (team_key, entries) in teams {
        let team = match team_key {
            Value::String(team) => team.clone(),
            other => {
                return Err(PolicyError::schema_invalid(
                    source,
                    format!("team name {:?} is not a string", other),
                ));
            }
        };

        let entries: &[Value] = match entries {
            Value::Sequence(entries) => entries.as_slice(),
            Value::Null => &[],
            _ => {
                return Err(PolicyError::schema_invalid(
                    source,
                    format!("team '{}' must list its table permissions", team),
                ));
            }
        };

        let permissions = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| parse_entry(source, &team, index, entry))
            .collect::<Result<Vec<_>, _>>()?;

        parsed.insert(team, permissions);
    }

    Ok(AccessPolicy { teams: parsed })
}

fn parse_entry(
    source: &PolicySource,
    team: &str,
    index: usize,
    entry: &Value,
) -> Result<TablePermission, PolicyError> {
    let invalid = |reason: String| {
        PolicyError::schema_invalid(source, format!("team '{}' entry {}: {}", team, index, reason))
    };

    let Value::Mapping(entry) = entry else {
        return Err(invalid("entry must be a mapping".to_string()));
    };

    let table = match entry.get("table") {
        Some(Value::String(table)) => table.clone(),
        Some(_) => return Err(invalid("table name must be a string".to_string())),
        None => return Err(invalid("missing 'table'".to_string())),
    };

    let actions = match entry.get("actions") {
        Some(Value::Sequence(actions)) => actions,
        Some(_) => return Err(invalid("'actions' must be a list".to_string())),
        None => return Err(invalid("missing 'actions'".to_string())),
    };

    let mut parsed = Vec::with_capacity(actions.len());
    for action in actions {
        let Value::String(literal) = action else {
            return Err(invalid(format!("action {:?} is not a string", action)));
        };
        let action: Action = literal.parse().map_err(|e| invalid(format!("{}", e)))?;
        parsed.push(action);
    }

    Ok(TablePermission::new(table, parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use permwatch_core::TablePermission;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    const FINANCE_POLICY: &str = r#"
teams:
  finance:
    - table: accounts
      actions: [SELECT, INSERT, UPDATE]
    - table: transactions
      actions: [SELECT, SELECT]
  sales:
    - table: customers
      actions: [SELECT]
"#;

    fn inline(content: &str) -> PolicySource {
        PolicySource::inline("test", content)
    }

    #[test]
    fn test_load_inline_policy() {
        let policy = load_policy(&inline(FINANCE_POLICY)).unwrap();

        assert_eq!(policy.teams.len(), 2);
        assert_eq!(
            policy.teams["finance"][0],
            TablePermission::new("accounts", [Action::Select, Action::Insert, Action::Update])
        );
        assert_eq!(
            policy.teams["finance"][1].actions,
            BTreeSet::from([Action::Select])
        );
        assert!(validate(&policy));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        let err = load_policy(&PolicySource::file(&path)).unwrap_err();
        assert!(matches!(err, PolicyError::NotFound { .. }));
        assert!(err.to_string().contains("absent.yaml"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access_config.yaml");
        std::fs::write(&path, FINANCE_POLICY).unwrap();

        let store = PolicyStore::load(PolicySource::file(&path)).unwrap();
        assert!(store.policy().has_team("sales"));
        assert_eq!(store.source(), &PolicySource::file(&path));
    }

    #[test]
    fn test_unparseable_yaml_is_malformed() {
        let err = load_policy(&inline("teams: [unclosed")).unwrap_err();
        assert!(matches!(err, PolicyError::Malformed { .. }));
    }

    #[test]
    fn test_empty_document_is_schema_invalid() {
        let err = load_policy(&inline("")).unwrap_err();
        assert!(matches!(err, PolicyError::SchemaInvalid { .. }));
    }

    #[test]
    fn test_missing_teams_key_is_schema_invalid() {
        let err = load_policy(&inline("groups: {}\n")).unwrap_err();
        match err {
            PolicyError::SchemaInvalid { reason, .. } => assert!(reason.contains("teams")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_action_is_schema_invalid() {
        let err = load_policy(&inline(
            "teams:\n  finance:\n    - table: accounts\n      actions: [SELECT, TRUNCATE]\n",
        ))
        .unwrap_err();

        match err {
            PolicyError::SchemaInvalid { reason, .. } => {
                assert!(reason.contains("TRUNCATE"));
                assert!(reason.contains("team 'finance' entry 0"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_string_table_is_schema_invalid() {
        let err = load_policy(&inline(
            "teams:\n  finance:\n    - table: 42\n      actions: [SELECT]\n",
        ))
        .unwrap_err();
        assert!(matches!(err, PolicyError::SchemaInvalid { .. }));
    }

    #[test]
    fn test_blank_table_is_schema_invalid() {
        let err = load_policy(&inline(
            "teams:\n  finance:\n    - table: \"  \"\n      actions: [SELECT]\n",
        ))
        .unwrap_err();
        assert!(matches!(err, PolicyError::SchemaInvalid { .. }));
    }

    #[test]
    fn test_team_without_entries_is_allowed() {
        let policy = load_policy(&inline("teams:\n  interns:\n")).unwrap();
        assert!(policy.has_team("interns"));
        assert!(policy.expected_permissions("interns").unwrap().is_empty());
    }
}
