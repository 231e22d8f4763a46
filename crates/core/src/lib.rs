//! Core types and traits for aspectdb
//!
//! This crate defines the foundational types used throughout the system:
//! - Urn: canonical entity identifier, plus typed URNs via `typed_urn!`
//! - Aspect / AspectUnion: closed sets of record shapes via `aspect_union!`
//! - AspectVersion: version slots, with 0 reserved for "latest"
//! - AuditStamp: (actor, time) attribution of every write
//! - ChangeEvent: what a notifier observes after a write
//! - Versioned / ListResult: read results with metadata
//! - StoreError: error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aspect;
pub mod audit;
pub mod error;
pub mod event;
pub mod urn;
pub mod version;
pub mod versioned;

pub use aspect::{Aspect, AspectUnion, UnionMember};
pub use audit::{AuditStamp, BOOTSTRAP_ACTOR};
pub use error::{StoreError, StoreResult};
pub use event::ChangeEvent;
pub use urn::{EntityUrn, Urn};
pub use version::AspectVersion;
pub use versioned::{ListResult, Versioned};
