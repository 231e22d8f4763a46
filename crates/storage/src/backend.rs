//! Backend abstraction
//!
//! [`AspectBackend`] is the narrow transactional surface the engine needs:
//! slot reads and writes, the optimistic read/commit pair, version listing
//! and id allocation. [`SchemaBackend`] adds verbatim execution of a schema
//! script for backends that have one.
//!
//! Thread safety: all methods must be safe to call concurrently from
//! multiple threads (requires Send + Sync).
//!
//! ## Slot rules
//!
//! For a chain holding `n` slots (versions `0..n`):
//!
//! | Operation | Allowed target | Otherwise |
//! |-----------|----------------|-----------|
//! | `write(Insert)` | version `n` | `SlotOccupied` below `n`, `VersionGap` above |
//! | `write(Update)` | any version `< n` | `SlotMissing` |
//! | `commit_latest` | chain length still `n` | `Conflict` |
//! | `insert_latest_all` | every chain empty | `SlotOccupied`, nothing written |
//!
//! These rules keep every chain contiguous from 0.

use aspectdb_core::AspectVersion;

use crate::error::{BackendError, BackendResult};
use crate::record::{AspectKey, AspectRecord, CommitOutcome, LatestRead, StoredAspect, WriteMode};

/// Namespace used for numeric id allocation
pub const DEFAULT_ID_NAMESPACE: &str = "aspectdb";

/// Transactional storage of versioned aspect payloads
pub trait AspectBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Create whatever structures this backend needs, idempotently
    fn ensure_schema(&self) -> BackendResult<()>;

    /// Write a record at an explicit slot
    ///
    /// Returns the previous content of the slot (always `None` for inserts).
    fn write(
        &self,
        key: &AspectKey,
        version: AspectVersion,
        record: AspectRecord,
        mode: WriteMode,
    ) -> BackendResult<Option<StoredAspect>>;

    /// Read one slot
    fn read(&self, key: &AspectKey, version: AspectVersion) -> BackendResult<Option<StoredAspect>>;

    /// Read slot 0 and the chain length in one consistent step
    fn read_latest(&self, key: &AspectKey) -> BackendResult<LatestRead>;

    /// Make `record` the new latest value if the chain still holds
    /// `expected_count` slots
    ///
    /// On success the previous latest value is archived at slot
    /// `expected_count` and `record` lands in slot 0, atomically.
    fn commit_latest(
        &self,
        key: &AspectKey,
        expected_count: u64,
        record: AspectRecord,
    ) -> BackendResult<CommitOutcome>;

    /// All filled slots of a chain, ascending
    fn list_versions(&self, key: &AspectKey) -> BackendResult<Vec<AspectVersion>>;

    /// Canonical URNs holding a latest value of `aspect`, ascending
    fn list_urns(&self, aspect: &str) -> BackendResult<Vec<String>>;

    /// True if any aspect is stored for `urn`
    fn exists(&self, urn: &str) -> BackendResult<bool>;

    /// Allocate a fresh id, unique within this store
    fn next_numeric_id(&self) -> BackendResult<u64>;

    /// Insert every record at slot 0 of its chain, all or nothing
    ///
    /// Fails with `SlotOccupied` if any target chain is non-empty, including
    /// a key repeated within `records`. On failure no record is left behind.
    fn insert_latest_all(&self, records: Vec<(AspectKey, AspectRecord)>) -> BackendResult<()>;
}

/// A backend that accepts schema scripts
pub trait SchemaBackend: AspectBackend {
    /// Execute a script verbatim
    fn execute_script(&self, script: &str) -> BackendResult<()>;
}

/// Validate an explicit-slot write against a chain of `count` slots
pub(crate) fn check_slot(
    key: &AspectKey,
    version: AspectVersion,
    mode: WriteMode,
    count: u64,
) -> BackendResult<()> {
    let v = version.as_u64();
    match mode {
        WriteMode::Insert if v < count => Err(BackendError::SlotOccupied {
            urn: key.urn.clone(),
            aspect: key.aspect.clone(),
            version,
        }),
        WriteMode::Insert if v > count => Err(BackendError::VersionGap {
            urn: key.urn.clone(),
            aspect: key.aspect.clone(),
            requested: version,
            next: AspectVersion::new(count),
        }),
        WriteMode::Insert => Ok(()),
        WriteMode::Update if v < count => Ok(()),
        WriteMode::Update => Err(BackendError::SlotMissing {
            urn: key.urn.clone(),
            aspect: key.aspect.clone(),
            version,
        }),
    }
}
