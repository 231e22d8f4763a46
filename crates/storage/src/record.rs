//! Storage-layer rows
//!
//! Backends know nothing about aspect types. They store JSON payload text
//! under an [`AspectKey`] and a version slot, together with the audit stamp
//! of the write.

use aspectdb_core::{AspectVersion, AuditStamp};

/// (URN, aspect kind) addressing one version chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AspectKey {
    /// Canonical URN string
    pub urn: String,
    /// Aspect kind tag
    pub aspect: String,
}

impl AspectKey {
    /// Create a key
    pub fn new(urn: impl Into<String>, aspect: impl Into<String>) -> Self {
        AspectKey {
            urn: urn.into(),
            aspect: aspect.into(),
        }
    }
}

/// What a write supplies: payload plus attribution
#[derive(Debug, Clone, PartialEq)]
pub struct AspectRecord {
    /// JSON payload text
    pub payload: String,
    /// Attribution of the write
    pub audit: AuditStamp,
}

impl AspectRecord {
    /// Create a record
    pub fn new(payload: String, audit: AuditStamp) -> Self {
        AspectRecord { payload, audit }
    }

    /// Place this record at a slot
    pub fn at(self, version: AspectVersion) -> StoredAspect {
        StoredAspect {
            version,
            payload: self.payload,
            audit: self.audit,
        }
    }
}

/// A record as it sits in a slot
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAspect {
    /// Slot number
    pub version: AspectVersion,
    /// JSON payload text
    pub payload: String,
    /// Attribution of the write that filled the slot
    pub audit: AuditStamp,
}

/// How `write` treats the target slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Slot must be free; fills it
    Insert,
    /// Slot must be filled; overwrites it in place
    Update,
}

/// Latest value and chain length, as seen by an optimistic reader
#[derive(Debug, Clone, PartialEq)]
pub struct LatestRead {
    /// Content of slot 0, if any
    pub latest: Option<StoredAspect>,
    /// Number of filled slots; the commit precondition
    pub version_count: u64,
}

/// Result of a conditional commit
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// The new value now occupies slot 0
    Committed {
        /// Previous content of slot 0, now archived
        previous: Option<StoredAspect>,
        /// Slot the previous value was archived to
        archived_at: Option<AspectVersion>,
    },
    /// Another writer advanced the chain since it was read
    Conflict {
        /// Chain length the caller read
        expected: u64,
        /// Chain length found at commit time
        actual: u64,
    },
}

impl CommitOutcome {
    /// True for `Committed`
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed { .. })
    }
}
