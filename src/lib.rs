//! aspectdb - Versioned, URN-keyed aspect storage
//!
//! Entities are addressed by URN and carry typed "aspects", each stored with
//! version history and an audit stamp. A store is either mutable
//! ([`LocalAspectStore`]) or a read-only snapshot ([`ImmutableAspectStore`]).
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use aspectdb::{
//!     aspect_union, Aspect, AspectReader, AspectVersion, BootstrapOptions, ImmutableAspectStore,
//!     MemoryBackend, Urn,
//! };
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! struct DatasetProperties {
//!     description: String,
//! }
//!
//! impl Aspect for DatasetProperties {
//!     const KIND: &'static str = "DatasetProperties";
//! }
//!
//! aspect_union! {
//!     enum DatasetAspect {
//!         DatasetProperties(DatasetProperties),
//!     }
//! }
//!
//! let urn = Urn::parse("corp:dataset:foo")?;
//! let value = DatasetProperties { description: "d".into() };
//! let store = ImmutableAspectStore::<Urn, DatasetAspect>::with_backend(
//!     Arc::new(MemoryBackend::new()),
//!     vec![(urn.clone(), value.clone().into())],
//!     false,
//!     BootstrapOptions::default(),
//! )?;
//!
//! assert_eq!(store.get::<DatasetProperties>(&urn, AspectVersion::LATEST)?, Some(value));
//! # Ok::<(), aspectdb::StoreError>(())
//! ```
//!
//! # Architecture
//!
//! - `aspectdb-core`: URNs, aspects, versions, audit stamps, errors
//! - `aspectdb-storage`: memory and SQLite backends
//! - `aspectdb-engine`: stores, snapshot loading, configuration

pub use aspectdb_core::{
    aspect_union, typed_urn, Aspect, AspectUnion, AspectVersion, AuditStamp, ChangeEvent,
    EntityUrn, ListResult, StoreError, StoreResult, UnionMember, Urn, Versioned, BOOTSTRAP_ACTOR,
};
pub use aspectdb_engine::{
    load_aspects, open_store, AddOutcome, AspectReader, AspectStoreHandle, AspectWriter,
    BackendKind, BootstrapOptions, ChangeNotifier, CollectingNotifier, ImmutableAspectStore,
    LocalAspectStore, NoopNotifier, RetryConfig, StoreConfig, WriteMetrics, CONFIG_FILE_NAME,
};
pub use aspectdb_storage::{
    AspectBackend, BackendError, MemoryBackend, SchemaBackend, SchemaScript, SqliteBackend,
    WriteMode,
};
