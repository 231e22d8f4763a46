//! Backend error types
//!
//! Backends report failures as [`BackendError`]. Crossing into the engine
//! every variant becomes `StoreError::Storage`, so callers see storage
//! failures unchanged in meaning.

use aspectdb_core::{AspectVersion, StoreError};
use thiserror::Error;

/// Result type alias for backend operations
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Errors raised by an aspect backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// Insert targeted a slot that already holds a value
    #[error("slot already written: {urn} {aspect} {version}")]
    SlotOccupied {
        /// Canonical URN
        urn: String,
        /// Aspect kind
        aspect: String,
        /// Requested slot
        version: AspectVersion,
    },

    /// Update targeted a slot that holds no value
    #[error("slot not found: {urn} {aspect} {version}")]
    SlotMissing {
        /// Canonical URN
        urn: String,
        /// Aspect kind
        aspect: String,
        /// Requested slot
        version: AspectVersion,
    },

    /// Insert would leave a hole in the version sequence
    #[error("version gap for {urn} {aspect}: requested {requested}, next free slot is {next}")]
    VersionGap {
        /// Canonical URN
        urn: String,
        /// Aspect kind
        aspect: String,
        /// Requested slot
        requested: AspectVersion,
        /// The only slot an insert may target
        next: AspectVersion,
    },

    /// SQLite failure
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored row could not be interpreted
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<BackendError> for StoreError {
    fn from(e: BackendError) -> Self {
        StoreError::storage(e.to_string())
    }
}
