//! End-to-end scenarios through the public facade
//!
//! A snapshot file becomes a read-only store; a config file becomes a
//! mutable one. Both are driven only through `aspectdb`'s re-exports.

use std::sync::Arc;

use aspectdb::{
    aspect_union, open_store, typed_urn, Aspect, AspectReader, AspectStoreHandle, AspectVersion,
    AspectWriter, AuditStamp, BootstrapOptions, EntityUrn, ImmutableAspectStore, SchemaScript,
    SqliteBackend, StoreConfig, StoreError, Urn, WriteMode,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DatasetProperties {
    description: String,
}

impl Aspect for DatasetProperties {
    const KIND: &'static str = "DatasetProperties";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Status {
    removed: bool,
}

impl Aspect for Status {
    const KIND: &'static str = "Status";
}

aspect_union! {
    enum DatasetAspect {
        DatasetProperties(DatasetProperties),
        Status(Status),
    }
}

typed_urn!(DatasetUrn, "dataset");

fn foo() -> DatasetUrn {
    "corp:dataset:foo".parse().unwrap()
}

fn description(d: &str) -> DatasetProperties {
    DatasetProperties {
        description: d.to_string(),
    }
}

#[test]
fn test_snapshot_store_serves_reads_and_refuses_writes() {
    let snapshot = r#"{"corp:dataset:foo": {"description": "d"}}"#;
    let store = ImmutableAspectStore::<DatasetUrn, DatasetAspect>::from_reader::<
        _,
        DatasetProperties,
        _,
    >(
        Arc::new(SqliteBackend::open_in_memory().unwrap()),
        &SchemaScript::Bundled,
        snapshot.as_bytes(),
        BootstrapOptions::default(),
    )
    .unwrap();

    let read = store
        .get_with_audit::<DatasetProperties>(&foo(), AspectVersion::LATEST)
        .unwrap()
        .unwrap();
    assert_eq!(read.value, description("d"));
    assert_eq!(read.version, AspectVersion::new(0));
    assert_eq!(read.audit, AuditStamp::bootstrap());
    assert!(store.get_latest::<Status>(&foo()).unwrap().is_none());

    let handle = AspectStoreHandle::Immutable(store);
    let err = handle
        .add(
            &foo(),
            |_: Option<&DatasetProperties>| Ok(description("changed")),
            &AuditStamp::now(Urn::parse("urn:li:corpuser:alice").unwrap()),
            3,
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::UnsupportedOperation(_)));
    assert_eq!(
        handle.get_latest::<DatasetProperties>(&foo()).unwrap(),
        Some(description("d"))
    );
}

#[test]
fn test_config_driven_mutable_store_keeps_history() {
    let config = StoreConfig::from_toml_str("backend = \"sqlite\"\nmax_retry = 2\n").unwrap();
    let store = open_store::<DatasetUrn, DatasetAspect, DatasetProperties>(&config).unwrap();
    let alice = AuditStamp::new(Urn::parse("urn:li:corpuser:alice").unwrap(), 1_000);
    let bob = AuditStamp::new(Urn::parse("urn:li:corpuser:bob").unwrap(), 2_000);

    store
        .save(
            &foo(),
            Status { removed: false }.into(),
            &alice,
            AspectVersion::LATEST,
            WriteMode::Insert,
        )
        .unwrap();
    for (stamp, text) in [(&alice, "first"), (&bob, "second"), (&alice, "third")] {
        store
            .add(
                &foo(),
                |_: Option<&DatasetProperties>| Ok(description(text)),
                stamp,
                config.max_retry,
            )
            .unwrap();
    }

    let page = store
        .list_versions(&foo(), DatasetProperties::KIND, 0, 2)
        .unwrap();
    assert_eq!(page.total_count, 3);
    assert_eq!(page.next_start, Some(2));

    let v2 = store
        .get_with_audit::<DatasetProperties>(&foo(), AspectVersion::new(2))
        .unwrap()
        .unwrap();
    assert_eq!(v2.value, description("second"));
    assert_eq!(v2.audit, bob);

    assert!(store.exists(&foo()).unwrap());
    assert_eq!(
        store.list_urns(Status::KIND).unwrap(),
        vec![DatasetUrn::from_urn(Urn::parse("corp:dataset:foo").unwrap()).unwrap()]
    );
    assert_ne!(store.new_numeric_id().unwrap(), store.new_numeric_id().unwrap());
}
