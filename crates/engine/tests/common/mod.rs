//! Shared fixtures for engine integration tests.
//!
//! Import via `mod common;`.

#![allow(dead_code)]

use std::io::Write;
use std::sync::{Arc, Once};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

pub use aspectdb_core::{
    aspect_union, typed_urn, Aspect, AspectVersion, AuditStamp, EntityUrn, StoreError,
    StoreResult, Urn,
};
pub use aspectdb_engine::{
    AspectReader, AspectWriter, BootstrapOptions, CollectingNotifier, ImmutableAspectStore,
    LocalAspectStore, RetryConfig,
};
pub use aspectdb_storage::{AspectBackend, MemoryBackend, SchemaScript, SqliteBackend, WriteMode};

// ============================================================================
// Aspects
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetProperties {
    pub description: String,
}

impl Aspect for DatasetProperties {
    const KIND: &'static str = "DatasetProperties";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ownership {
    pub owners: Vec<String>,
}

impl Aspect for Ownership {
    const KIND: &'static str = "Ownership";
}

aspect_union! {
    /// Aspects a dataset may carry
    pub enum DatasetAspect {
        DatasetProperties(DatasetProperties),
        Ownership(Ownership),
    }
}

typed_urn!(
    /// Dataset identifier
    DatasetUrn, "dataset"
);

pub fn props(description: &str) -> DatasetProperties {
    DatasetProperties {
        description: description.to_string(),
    }
}

pub fn dataset(id: &str) -> DatasetUrn {
    format!("corp:dataset:{id}").parse().unwrap()
}

pub fn actor() -> AuditStamp {
    AuditStamp::new(Urn::parse("urn:li:corpuser:datahub").unwrap(), 1_700_000_000_000)
}

// ============================================================================
// Stores
// ============================================================================

pub type DatasetStore = LocalAspectStore<DatasetUrn, DatasetAspect>;
pub type ImmutableDatasetStore = ImmutableAspectStore<DatasetUrn, DatasetAspect>;

/// Mutable store over a fresh memory backend, without backoff sleeps
pub fn memory_store() -> DatasetStore {
    DatasetStore::new(Arc::new(MemoryBackend::new()))
        .with_retry_config(RetryConfig::immediate())
}

/// Fresh SQLite backend with the bundled schema applied
pub fn sqlite_backend() -> Arc<SqliteBackend> {
    let backend = SqliteBackend::open_in_memory().unwrap();
    backend.ensure_schema().unwrap();
    Arc::new(backend)
}

/// Write `json` to a temporary file
pub fn snapshot_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

static INIT_TRACING: Once = Once::new();

/// Route engine logs to the test writer
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}
