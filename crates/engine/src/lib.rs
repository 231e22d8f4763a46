//! Aspect store engine for aspectdb
//!
//! This crate builds the stores on top of the storage backends:
//! - LocalAspectStore: versioned save, optimistic `add`, id allocation
//! - ImmutableAspectStore: snapshot-bootstrapped, read capability only
//! - AspectStoreHandle: runtime choice of either, from `aspectdb.toml`
//! - load_aspects: JSON snapshot decoding
//! - ChangeNotifier: post-commit change events
//!
//! Reads go through [`AspectReader`]; writes through [`AspectWriter`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod handle;
pub mod immutable;
pub mod local;
pub mod notifier;
pub mod retry;
pub mod snapshot;
pub mod traits;

pub use config::{BackendKind, StoreConfig, CONFIG_FILE_NAME};
pub use handle::{open_store, AspectStoreHandle};
pub use immutable::{BootstrapOptions, ImmutableAspectStore};
pub use local::LocalAspectStore;
pub use notifier::{ChangeNotifier, CollectingNotifier, NoopNotifier};
pub use retry::{RetryConfig, WriteMetrics};
pub use snapshot::load_aspects;
pub use traits::{AddOutcome, AspectReader, AspectWriter};
