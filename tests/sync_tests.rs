//! End-to-end synchronization tests against the in-memory registry

use std::fs;
use std::path::Path;
use std::time::Duration;

use polyn_schemas::config::NatsConfig;
use polyn_schemas::error::StoreOp;
use polyn_schemas::store::Mutation;
use polyn_schemas::sync::{self, sync_desired, sync_dir};
use polyn_schemas::{source, MemoryStore, PolynConfig, RegistryStore, SyncError};
use tempfile::tempdir;

const WAIT: Duration = Duration::from_millis(20);

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn keys(store: &MemoryStore) -> Vec<String> {
    store.entries().into_keys().collect()
}

// =============================================================================
// Mirror and idempotence
// =============================================================================

#[tokio::test]
async fn test_registry_mirrors_source_tree() {
    let dir = tempdir().unwrap();
    write(dir.path(), "app.widgets.created.json", r#"{ "type": "object",  "title": "Created" }"#);
    write(dir.path(), "billing/billing.invoice.paid.json", r#"{"type": "object"}"#);

    let store = MemoryStore::new("POLYN_SCHEMAS");
    let report = sync_dir(&store, dir.path(), WAIT).await.unwrap();

    assert_eq!(report.put, vec!["app.widgets.created", "billing.invoice.paid"]);
    assert!(report.deleted.is_empty());

    let entries = store.entries();
    assert_eq!(
        entries["app.widgets.created"],
        br#"{"title":"Created","type":"object"}"#.to_vec()
    );
    assert_eq!(entries["billing.invoice.paid"], br#"{"type":"object"}"#.to_vec());
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.json", r#"{"type": "string"}"#);
    write(dir.path(), "b.json", r#"{"type": "number"}"#);

    let store = MemoryStore::new("POLYN_SCHEMAS");
    sync_dir(&store, dir.path(), WAIT).await.unwrap();
    let after_first = store.entries();

    let report = sync_dir(&store, dir.path(), WAIT).await.unwrap();
    assert_eq!(store.entries(), after_first);
    assert_eq!(report.put, vec!["a", "b"]);
    assert!(report.deleted.is_empty());
}

#[tokio::test]
async fn test_stale_entries_are_deleted_after_puts() {
    let dir = tempdir().unwrap();
    write(dir.path(), "y.json", "{}");
    write(dir.path(), "z.json", "{}");

    let store = MemoryStore::with_entries("POLYN_SCHEMAS", [("x", "{}"), ("y", "{}")]);
    let report = sync_dir(&store, dir.path(), WAIT).await.unwrap();

    assert_eq!(report.deleted, vec!["x"]);
    assert_eq!(keys(&store), vec!["y", "z"]);
    assert_eq!(
        store.mutations(),
        vec![
            Mutation::Put("y".into()),
            Mutation::Put("z".into()),
            Mutation::Delete("x".into()),
        ]
    );
}

#[tokio::test]
async fn test_tombstoned_entries_are_not_deleted_again() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.json", "{}");

    let store = MemoryStore::with_entries("POLYN_SCHEMAS", [("gone", "")]);
    let report = sync_dir(&store, dir.path(), WAIT).await.unwrap();
    assert!(report.deleted.is_empty());
}

#[tokio::test]
async fn test_empty_snapshot_means_only_puts() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.json", "{}");
    write(dir.path(), "b.json", "{}");

    let store = MemoryStore::new("POLYN_SCHEMAS");
    let existing = store.snapshot(WAIT).await.unwrap();
    assert!(existing.is_empty());

    let desired = source::discover(dir.path()).unwrap();
    let report = sync_desired(&store, &desired, WAIT).await.unwrap();
    assert_eq!(report.put.len(), 2);
    assert!(report.deleted.is_empty());
}

#[tokio::test]
async fn test_empty_source_clears_registry() {
    let dir = tempdir().unwrap();
    let store = MemoryStore::with_entries("POLYN_SCHEMAS", [("a", "{}"), ("b", "{}")]);

    let report = sync_dir(&store, dir.path(), WAIT).await.unwrap();
    assert_eq!(report.deleted, vec!["a", "b"]);
    assert!(store.entries().is_empty());
}

// =============================================================================
// Validation happens before any mutation
// =============================================================================

#[tokio::test]
async fn test_bad_name_stops_before_registry() {
    let dir = tempdir().unwrap();
    write(dir.path(), "Foo.json", "{}");

    let store = MemoryStore::with_entries("POLYN_SCHEMAS", [("x", "{}")]);
    let err = sync_dir(&store, dir.path(), WAIT).await.unwrap_err();

    assert!(matches!(err, SyncError::InvalidName { ref name, .. } if name == "Foo"));
    assert!(store.mutations().is_empty());
}

#[tokio::test]
async fn test_invalid_schema_stops_before_registry() {
    let dir = tempdir().unwrap();
    write(dir.path(), "good.json", "{}");
    write(dir.path(), "nested/broken.json", r#"{"type": "invalid-type-xyz"}"#);

    let store = MemoryStore::new("POLYN_SCHEMAS");
    let err = sync_dir(&store, dir.path(), WAIT).await.unwrap_err();

    match err {
        SyncError::InvalidSchema { name, .. } => assert_eq!(name, "broken"),
        other => panic!("Expected InvalidSchema, got {:?}", other),
    }
    assert!(store.mutations().is_empty());
}

#[tokio::test]
async fn test_duplicates_stop_before_registry() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a/foo.json", "{}");
    write(dir.path(), "b/foo.json", "{}");

    let store = MemoryStore::new("POLYN_SCHEMAS");
    let err = sync_dir(&store, dir.path(), WAIT).await.unwrap_err();

    let message = err.to_string();
    assert!(message.contains("foo"));
    assert!(message.contains(&dir.path().join("a/foo.json").display().to_string()));
    assert!(message.contains(&dir.path().join("b/foo.json").display().to_string()));
    assert!(store.mutations().is_empty());
}

// =============================================================================
// Failure policy
// =============================================================================

#[tokio::test]
async fn test_failed_put_leaves_superset() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.json", "{}");
    write(dir.path(), "b.json", "{}");

    let store = MemoryStore::with_entries("POLYN_SCHEMAS", [("stale", "{}")]);
    store.fail_put("b");

    let err = sync_dir(&store, dir.path(), WAIT).await.unwrap_err();
    assert!(matches!(err, SyncError::Store { op: StoreOp::Put, ref key, .. } if key == "b"));
    assert_eq!(keys(&store), vec!["a", "stale"]);
}

#[tokio::test]
async fn test_failed_delete_is_surfaced() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.json", "{}");

    let store = MemoryStore::with_entries("POLYN_SCHEMAS", [("old", "{}")]);
    store.fail_delete("old");

    let err = sync_dir(&store, dir.path(), WAIT).await.unwrap_err();
    assert!(matches!(err, SyncError::Store { op: StoreOp::Delete, .. }));
    assert_eq!(keys(&store), vec!["a", "old"]);
}

#[tokio::test]
async fn test_rerun_after_failure_converges() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.json", "{}");
    write(dir.path(), "b.json", "{}");

    let store = MemoryStore::with_entries("POLYN_SCHEMAS", [("stale", "{}")]);
    store.fail_put("b");
    assert!(sync_dir(&store, dir.path(), WAIT).await.is_err());

    let healthy = MemoryStore::with_entries("POLYN_SCHEMAS", store.entries());
    sync_dir(&healthy, dir.path(), WAIT).await.unwrap();
    assert_eq!(keys(&healthy), vec!["a", "b"]);
}

// =============================================================================
// Source edge cases and the NATS entry point
// =============================================================================

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_schema_keeps_its_registry_entry() {
    use std::os::unix::fs::symlink;

    let outside = tempdir().unwrap();
    write(outside.path(), "linked.json", "{}");

    let dir = tempdir().unwrap();
    write(dir.path(), "local.json", "{}");
    symlink(outside.path().join("linked.json"), dir.path().join("linked.json")).unwrap();

    let store = MemoryStore::with_entries("POLYN_SCHEMAS", [("linked", "{}")]);
    let report = sync_dir(&store, dir.path(), WAIT).await.unwrap();

    assert!(report.deleted.is_empty());
    assert_eq!(keys(&store), vec!["linked", "local"]);
}

#[tokio::test]
async fn test_unreadable_json_does_not_hide_other_problems() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("binary.json"), [0xff, 0xfe]).unwrap();
    write(dir.path(), "Upper.json", "{}");

    let store = MemoryStore::with_entries("POLYN_SCHEMAS", [("x", "{}")]);
    let err = sync_dir(&store, dir.path(), WAIT).await.unwrap_err();

    assert!(matches!(err, SyncError::Invalid(_)));
    assert_eq!(err.problems().len(), 2);
    assert!(store.mutations().is_empty());
}

#[tokio::test]
async fn test_run_rejects_bad_names_before_connecting() {
    let dir = tempdir().unwrap();
    write(dir.path(), "Foo.json", "{}");

    let config = PolynConfig {
        nats: NatsConfig {
            servers: vec!["nats://127.0.0.1:1".to_string()],
            ..Default::default()
        },
        ..Default::default()
    };

    let err = sync::run(&config, dir.path()).await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidName { ref name, .. } if name == "Foo"));
}
