//! Immutable store construction and read-only behavior
//!
//! Covers both construction forms, the bootstrap audit stamp, construction
//! failures, and the write rejections of the runtime handle.

mod common;

use std::collections::BTreeMap;
use std::fs::File;
use std::sync::Arc;

use aspectdb_engine::{open_store, AspectStoreHandle, StoreConfig};
use common::*;

fn entries(n: usize) -> Vec<(DatasetUrn, DatasetAspect)> {
    (0..n)
        .map(|i| (dataset(&format!("ds{i:03}")), props(&format!("d{i}")).into()))
        .collect()
}

// ============================================================================
// Production Construction
// ============================================================================

#[test]
fn test_every_entry_reads_back_at_latest_with_bootstrap_stamp() {
    init_tracing();
    let backend = Arc::new(SqliteBackend::open_in_memory().unwrap());
    let store = ImmutableDatasetStore::new(
        backend,
        &SchemaScript::Bundled,
        entries(25),
        BootstrapOptions::default(),
    )
    .unwrap();
    assert_eq!(store.loaded(), 25);

    for (i, (urn, _)) in entries(25).into_iter().enumerate() {
        let read = store
            .get_with_audit::<DatasetProperties>(&urn, AspectVersion::LATEST)
            .unwrap()
            .unwrap();
        assert_eq!(read.value, props(&format!("d{i}")));
        assert_eq!(read.version, AspectVersion::LATEST);
        assert_eq!(read.audit, AuditStamp::bootstrap());
        assert_eq!(read.audit.actor.as_str(), "urn:li:dummy:unknown");
        assert_eq!(read.audit.time, 0);

        // Nothing archived
        let versions = store
            .list_versions(&urn, DatasetProperties::KIND, 0, 10)
            .unwrap();
        assert_eq!(versions.values, vec![AspectVersion::LATEST]);
    }
}

#[test]
fn test_iteration_order_does_not_change_final_state() {
    let forward = ImmutableDatasetStore::new(
        Arc::new(SqliteBackend::open_in_memory().unwrap()),
        &SchemaScript::Bundled,
        entries(10),
        BootstrapOptions::default(),
    )
    .unwrap();
    let reversed = ImmutableDatasetStore::new(
        Arc::new(SqliteBackend::open_in_memory().unwrap()),
        &SchemaScript::Bundled,
        entries(10).into_iter().rev(),
        BootstrapOptions::default(),
    )
    .unwrap();

    let urns: Vec<DatasetUrn> = entries(10).into_iter().map(|(u, _)| u).collect();
    assert_eq!(
        forward.batch_get::<DatasetProperties>(&urns).unwrap(),
        reversed.batch_get::<DatasetProperties>(&urns).unwrap()
    );
    assert_eq!(
        forward.list_urns(DatasetProperties::KIND).unwrap(),
        reversed.list_urns(DatasetProperties::KIND).unwrap()
    );
}

#[test]
fn test_custom_schema_script_file() {
    let script = snapshot_file(aspectdb_storage::BUNDLED_SCHEMA);
    let store = ImmutableDatasetStore::new(
        Arc::new(SqliteBackend::open_in_memory().unwrap()),
        &SchemaScript::File(script.path().to_path_buf()),
        entries(2),
        BootstrapOptions::default(),
    )
    .unwrap();
    assert!(store.exists(&dataset("ds001")).unwrap());
}

#[test]
fn test_missing_schema_script_yields_no_store() {
    let result = ImmutableDatasetStore::new(
        Arc::new(SqliteBackend::open_in_memory().unwrap()),
        &SchemaScript::File("/nonexistent/create-all.sql".into()),
        entries(2),
        BootstrapOptions::default(),
    );
    assert!(matches!(result, Err(StoreError::ResourceInit(_))));
}

#[test]
fn test_broken_schema_script_is_storage_error() {
    let script = snapshot_file("CREATE TABLE (;");
    let result = ImmutableDatasetStore::new(
        Arc::new(SqliteBackend::open_in_memory().unwrap()),
        &SchemaScript::File(script.path().to_path_buf()),
        entries(1),
        BootstrapOptions::default(),
    );
    assert!(matches!(result, Err(StoreError::Storage(_))));
}

#[test]
fn test_bootstrap_into_populated_backend_fails() {
    let backend = sqlite_backend();
    let seeded = DatasetStore::new(backend.clone());
    seeded
        .save(
            &dataset("ds000"),
            props("already here").into(),
            &actor(),
            AspectVersion::LATEST,
            WriteMode::Insert,
        )
        .unwrap();

    let result = ImmutableDatasetStore::new(
        backend.clone(),
        &SchemaScript::Bundled,
        entries(3),
        BootstrapOptions::default(),
    );
    assert!(matches!(result, Err(StoreError::Storage(_))));

    // The existing value is neither overwritten nor archived
    let versions = seeded
        .list_versions(&dataset("ds000"), DatasetProperties::KIND, 0, 10)
        .unwrap();
    assert_eq!(versions.total_count, 1);
    assert_eq!(
        seeded.get_latest::<DatasetProperties>(&dataset("ds000")).unwrap(),
        Some(props("already here"))
    );
}

#[test]
fn test_late_collision_rolls_back_whole_load() {
    let backend = sqlite_backend();
    let seeded = DatasetStore::new(backend.clone());
    seeded
        .save(
            &dataset("ds002"),
            props("already here").into(),
            &actor(),
            AspectVersion::LATEST,
            WriteMode::Insert,
        )
        .unwrap();

    let result = ImmutableDatasetStore::new(
        backend.clone(),
        &SchemaScript::Bundled,
        entries(3),
        BootstrapOptions::default(),
    );
    assert!(matches!(result, Err(StoreError::Storage(_))));

    assert!(!seeded.exists(&dataset("ds000")).unwrap());
    assert!(!seeded.exists(&dataset("ds001")).unwrap());
    assert_eq!(
        seeded.list_urns(DatasetProperties::KIND).unwrap(),
        vec![dataset("ds002")]
    );
}

#[test]
fn test_repeated_urn_in_entries_fails_without_residue() {
    let backend = Arc::new(MemoryBackend::new());
    let result = ImmutableDatasetStore::with_backend(
        backend.clone(),
        vec![
            (dataset("a"), props("1").into()),
            (dataset("b"), props("2").into()),
            (dataset("a"), props("3").into()),
        ],
        false,
        BootstrapOptions::default(),
    );
    assert!(matches!(result, Err(StoreError::Storage(_))));
    assert_eq!(backend.total_slots(), 0);
}

// ============================================================================
// Test Construction
// ============================================================================

#[test]
fn test_test_form_over_memory_backend() {
    let store = ImmutableDatasetStore::with_backend(
        Arc::new(MemoryBackend::new()),
        entries(3),
        false,
        BootstrapOptions::default(),
    )
    .unwrap();
    assert_eq!(
        store.list_urns(DatasetProperties::KIND).unwrap(),
        vec![dataset("ds000"), dataset("ds001"), dataset("ds002")]
    );
    assert!(store.list_urns(Ownership::KIND).unwrap().is_empty());
}

#[test]
fn test_test_form_generates_ddl_on_request() {
    let without = ImmutableDatasetStore::with_backend(
        Arc::new(SqliteBackend::open_in_memory().unwrap()),
        entries(1),
        false,
        BootstrapOptions::default(),
    );
    assert!(without.is_err());

    let with = ImmutableDatasetStore::with_backend(
        Arc::new(SqliteBackend::open_in_memory().unwrap()),
        entries(1),
        true,
        BootstrapOptions::default(),
    )
    .unwrap();
    assert_eq!(with.loaded(), 1);
}

#[test]
fn test_from_reader_loads_snapshot_stream() {
    let file = snapshot_file(
        r#"{
            "corp:dataset:foo": {"description": "d"},
            "corp:dataset:bar": {"description": "e"}
        }"#,
    );
    let store = ImmutableDatasetStore::from_reader::<_, DatasetProperties, _>(
        Arc::new(SqliteBackend::open_in_memory().unwrap()),
        &SchemaScript::Bundled,
        File::open(file.path()).unwrap(),
        BootstrapOptions::default(),
    )
    .unwrap();
    assert_eq!(store.loaded(), 2);
    assert_eq!(
        store.get_latest::<DatasetProperties>(&dataset("bar")).unwrap(),
        Some(props("e"))
    );
}

#[test]
fn test_from_reader_rejects_wrong_entity_kind() {
    let result = ImmutableDatasetStore::from_reader::<_, DatasetProperties, _>(
        Arc::new(SqliteBackend::open_in_memory().unwrap()),
        &SchemaScript::Bundled,
        r#"{"corp:user:bob": {"description": "d"}}"#.as_bytes(),
        BootstrapOptions::default(),
    );
    assert!(matches!(result, Err(StoreError::Parse(_))));
}

// ============================================================================
// Runtime Handle
// ============================================================================

fn handle() -> AspectStoreHandle<DatasetUrn, DatasetAspect> {
    let store = ImmutableDatasetStore::with_backend(
        Arc::new(MemoryBackend::new()),
        entries(2),
        false,
        BootstrapOptions::default(),
    )
    .unwrap();
    AspectStoreHandle::Immutable(store)
}

#[test]
fn test_add_through_handle_is_unsupported_and_changes_nothing() {
    let handle = handle();
    let urn = dataset("ds000");
    let before = handle
        .get_with_audit::<DatasetProperties>(&urn, AspectVersion::LATEST)
        .unwrap();

    let mut called = false;
    let err = handle
        .add(
            &urn,
            |_: Option<&DatasetProperties>| {
                called = true;
                Ok(props("changed"))
            },
            &actor(),
            3,
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::UnsupportedOperation(_)));
    assert!(!called);

    let after = handle
        .get_with_audit::<DatasetProperties>(&urn, AspectVersion::LATEST)
        .unwrap();
    assert_eq!(before, after);
    assert_eq!(
        handle
            .list_versions(&urn, DatasetProperties::KIND, 0, 10)
            .unwrap()
            .total_count,
        1
    );
}

#[test]
fn test_new_numeric_id_through_handle_is_unsupported() {
    let err = handle().new_numeric_id().unwrap_err();
    assert!(matches!(err, StoreError::UnsupportedOperation(_)));
}

#[test]
fn test_open_store_read_only_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("snapshot.json");
    std::fs::write(&snapshot, r#"{"corp:dataset:foo": {"description": "d"}}"#).unwrap();

    let config_path = dir.path().join(aspectdb_engine::CONFIG_FILE_NAME);
    std::fs::write(
        &config_path,
        format!("backend = \"sqlite\"\nread_only = true\nsnapshot = {:?}\n", snapshot),
    )
    .unwrap();

    // Every open bootstraps a fresh database, so reopening is not a collision
    for _ in 0..2 {
        let config = StoreConfig::from_file(&config_path).unwrap();
        let handle = open_store::<DatasetUrn, DatasetAspect, DatasetProperties>(&config).unwrap();
        assert!(handle.is_read_only());
        assert_eq!(
            handle.get_latest::<DatasetProperties>(&dataset("foo")).unwrap(),
            Some(props("d"))
        );
        assert!(handle.new_numeric_id().unwrap_err().is_unsupported());
    }
}

#[test]
fn test_open_store_read_only_refuses_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        backend: "sqlite".into(),
        sqlite_path: Some(dir.path().join("aspects.db")),
        read_only: true,
        snapshot: Some(dir.path().join("snapshot.json")),
        ..StoreConfig::default()
    };
    let err = open_store::<DatasetUrn, DatasetAspect, DatasetProperties>(&config).unwrap_err();
    assert!(matches!(err, StoreError::Config(_)));
    assert!(!dir.path().join("aspects.db").exists());
}

#[test]
fn test_open_store_mutable_sqlite_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        backend: "sqlite".into(),
        sqlite_path: Some(dir.path().join("aspects.db")),
        ..StoreConfig::default()
    };

    {
        let handle = open_store::<DatasetUrn, DatasetAspect, DatasetProperties>(&config).unwrap();
        handle
            .add(&dataset("foo"), |_: Option<&DatasetProperties>| Ok(props("v1")), &actor(), 0)
            .unwrap();
    }

    // Schema script is idempotent; data survives reopen
    let handle = open_store::<DatasetUrn, DatasetAspect, DatasetProperties>(&config).unwrap();
    let mut seen = BTreeMap::new();
    handle
        .add(
            &dataset("foo"),
            |current: Option<&DatasetProperties>| {
                seen.insert("previous", current.cloned());
                Ok(props("v2"))
            },
            &actor(),
            0,
        )
        .unwrap();
    assert_eq!(seen["previous"], Some(props("v1")));
    assert_eq!(
        handle
            .get::<DatasetProperties>(&dataset("foo"), AspectVersion::new(1))
            .unwrap(),
        Some(props("v1"))
    );
}
