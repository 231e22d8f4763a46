//! Error types for aspectdb
//!
//! This module defines the error taxonomy shared by every layer.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! | Variant | Raised by |
//! |---------|-----------|
//! | `Parse` | URN parsing, snapshot decoding |
//! | `ConcurrencyExhausted` | `add` after its retry budget is spent |
//! | `UnsupportedOperation` | write calls routed to a read-only store |
//! | `Storage` | backend I/O and transactional failures |
//! | `ResourceInit` | missing schema script or snapshot stream |
//! | `Serialization` | aspect payload encode/decode |
//! | `Config` | invalid `aspectdb.toml` |

use std::io;
use thiserror::Error;

/// Result type alias for aspectdb operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error types for the aspect store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed URN or malformed snapshot structure
    #[error("Parse error: {0}")]
    Parse(String),

    /// `add` could not commit within its retry budget
    #[error("Concurrency exhausted for {urn} ({aspect}) after {attempts} attempts")]
    ConcurrencyExhausted {
        /// Canonical URN of the contended entity
        urn: String,
        /// Aspect kind that was being updated
        aspect: String,
        /// Number of read-modify-write attempts made
        attempts: usize,
    },

    /// A write operation was invoked on a store that does not support it
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Backend I/O or transactional failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// A resource needed at construction time could not be acquired
    #[error("Resource initialization failed: {0}")]
    ResourceInit(String),

    /// Aspect payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error while reading an input stream
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Build a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        StoreError::Parse(msg.into())
    }

    /// Build a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        StoreError::Storage(msg.into())
    }

    /// Build a resource initialization error
    pub fn resource_init(msg: impl Into<String>) -> Self {
        StoreError::ResourceInit(msg.into())
    }

    /// Build a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        StoreError::Serialization(msg.into())
    }

    /// Build an unsupported operation error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        StoreError::UnsupportedOperation(msg.into())
    }

    /// Build a config error
    pub fn config(msg: impl Into<String>) -> Self {
        StoreError::Config(msg.into())
    }

    /// True for `ConcurrencyExhausted`
    pub fn is_concurrency_exhausted(&self) -> bool {
        matches!(self, StoreError::ConcurrencyExhausted { .. })
    }

    /// True for `UnsupportedOperation`
    pub fn is_unsupported(&self) -> bool {
        matches!(self, StoreError::UnsupportedOperation(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
