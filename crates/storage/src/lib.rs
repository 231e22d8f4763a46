//! Storage layer for aspectdb
//!
//! This crate implements the aspect backends:
//! - `AspectBackend`: slot reads and writes, optimistic read/commit, id allocation
//! - `MemoryBackend`: DashMap + FxHashMap, sharded per URN
//! - `SqliteBackend`: `metadata_aspect` / `metadata_id` tables over rusqlite
//! - `SchemaScript`: bundled or on-disk schema bootstrap script
//!
//! Backends store JSON payload text; they never see aspect types.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod memory;
pub mod record;
pub mod schema;
pub mod sqlite;

pub use backend::{AspectBackend, SchemaBackend, DEFAULT_ID_NAMESPACE};
pub use error::{BackendError, BackendResult};
pub use memory::{MemoryBackend, Shard, VersionChain};
pub use record::{AspectKey, AspectRecord, CommitOutcome, LatestRead, StoredAspect, WriteMode};
pub use schema::{SchemaScript, BUNDLED_SCHEMA, BUNDLED_SCHEMA_NAME};
pub use sqlite::SqliteBackend;
