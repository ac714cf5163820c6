use permwatch_core::{AccessPolicy, Action, TablePermission, User};
use permwatch_store::{
    ErrorInjector, PermissionStore, PermissionWriter, SqlitePermissionStore, StoreError, seed,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

fn policy() -> AccessPolicy {
    AccessPolicy::default()
        .with_team(
            "finance",
            vec![
                TablePermission::new("accounts", [Action::Select, Action::Insert, Action::Update]),
                TablePermission::new("transactions", [Action::Select]),
            ],
        )
        .with_team(
            "sales",
            vec![TablePermission::new("customers", [Action::Select, Action::Update])],
        )
}

fn users() -> Vec<User> {
    vec![
        User::new("alice", "finance"),
        User::new("carol", "sales"),
        User::new("bob", "legal"),
    ]
}

#[tokio::test]
async fn seeded_file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("audit.db");

    let store = SqlitePermissionStore::create(&path).await.unwrap();
    let written = seed(&store, &policy(), &users()).await.unwrap();
    assert_eq!(written, 6);

    let reopened = SqlitePermissionStore::open(&path).await.unwrap();
    assert_eq!(
        reopened.who_can("accounts", Action::Select).await.unwrap(),
        BTreeSet::from(["alice".to_string()])
    );
    assert!(reopened.granted_permissions("bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn drift_round_trip_through_sqlite() {
    let store = SqlitePermissionStore::in_memory().await.unwrap();
    let injector = ErrorInjector::new(&store);

    injector.reset_to_baseline(&policy(), &users()).await.unwrap();
    let baseline = store.all_records().await.unwrap();

    injector
        .grant_excess("alice", "accounts", Action::Delete)
        .await
        .unwrap();
    injector
        .revoke_required("carol", "customers", Action::Update)
        .await
        .unwrap();

    assert_eq!(
        store.who_can("accounts", Action::Delete).await.unwrap(),
        BTreeSet::from(["alice".to_string()])
    );
    assert!(store.who_can("customers", Action::Update).await.unwrap().is_empty());

    injector.reset_to_baseline(&policy(), &users()).await.unwrap();
    assert_eq!(store.all_records().await.unwrap(), baseline);
}

#[tokio::test]
async fn grant_excess_for_unseeded_user_fails() {
    let store = SqlitePermissionStore::in_memory().await.unwrap();
    seed(&store, &policy(), &users()).await.unwrap();

    let err = ErrorInjector::new(&store)
        .grant_excess("bob", "accounts", Action::Select)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UserNotFound { .. }));
}
