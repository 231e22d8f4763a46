//! Runtime store handle
//!
//! [`AspectStoreHandle`] holds either a mutable or an immutable store when
//! the choice is made at runtime (from `aspectdb.toml`, say). It implements
//! both capabilities; write calls against the immutable variant fail with
//! `StoreError::UnsupportedOperation` and change nothing.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use tracing::info;

use aspectdb_core::{
    AspectUnion, AspectVersion, AuditStamp, EntityUrn, ListResult, StoreError, StoreResult,
    UnionMember, Versioned,
};
use aspectdb_storage::{AspectBackend, MemoryBackend, SchemaBackend, SqliteBackend, WriteMode};

use crate::config::{BackendKind, StoreConfig};
use crate::immutable::{typed_entries, BootstrapOptions, ImmutableAspectStore};
use crate::local::LocalAspectStore;
use crate::traits::{AddOutcome, AspectReader, AspectWriter};

const IMMUTABLE_WRITE: &str = "Not supported by immutable store";

/// A store whose mutability is decided at runtime
#[derive(Debug)]
pub enum AspectStoreHandle<U: EntityUrn, A: AspectUnion> {
    /// Accepts reads and writes
    Mutable(LocalAspectStore<U, A>),
    /// Accepts reads only
    Immutable(ImmutableAspectStore<U, A>),
}

impl<U: EntityUrn, A: AspectUnion> AspectStoreHandle<U, A> {
    /// True for the immutable variant
    pub fn is_read_only(&self) -> bool {
        matches!(self, AspectStoreHandle::Immutable(_))
    }

    fn writer(&self) -> StoreResult<&LocalAspectStore<U, A>> {
        match self {
            AspectStoreHandle::Mutable(store) => Ok(store),
            AspectStoreHandle::Immutable(_) => Err(StoreError::unsupported(IMMUTABLE_WRITE)),
        }
    }
}

impl<U: EntityUrn, A: AspectUnion> From<LocalAspectStore<U, A>> for AspectStoreHandle<U, A> {
    fn from(store: LocalAspectStore<U, A>) -> Self {
        AspectStoreHandle::Mutable(store)
    }
}

impl<U: EntityUrn, A: AspectUnion> From<ImmutableAspectStore<U, A>> for AspectStoreHandle<U, A> {
    fn from(store: ImmutableAspectStore<U, A>) -> Self {
        AspectStoreHandle::Immutable(store)
    }
}

impl<U: EntityUrn, A: AspectUnion> AspectReader for AspectStoreHandle<U, A> {
    type Urn = U;
    type Union = A;

    fn get_union(
        &self,
        urn: &U,
        kind: &str,
        version: AspectVersion,
    ) -> StoreResult<Option<Versioned<A>>> {
        match self {
            AspectStoreHandle::Mutable(store) => store.get_union(urn, kind, version),
            AspectStoreHandle::Immutable(store) => store.get_union(urn, kind, version),
        }
    }

    fn list_versions(
        &self,
        urn: &U,
        kind: &str,
        start: usize,
        count: usize,
    ) -> StoreResult<ListResult<AspectVersion>> {
        match self {
            AspectStoreHandle::Mutable(store) => store.list_versions(urn, kind, start, count),
            AspectStoreHandle::Immutable(store) => store.list_versions(urn, kind, start, count),
        }
    }

    fn list_urns(&self, kind: &str) -> StoreResult<Vec<U>> {
        match self {
            AspectStoreHandle::Mutable(store) => store.list_urns(kind),
            AspectStoreHandle::Immutable(store) => store.list_urns(kind),
        }
    }

    fn exists(&self, urn: &U) -> StoreResult<bool> {
        match self {
            AspectStoreHandle::Mutable(store) => store.exists(urn),
            AspectStoreHandle::Immutable(store) => store.exists(urn),
        }
    }
}

impl<U: EntityUrn, A: AspectUnion> AspectWriter for AspectStoreHandle<U, A> {
    fn save(
        &self,
        urn: &U,
        aspect: A,
        audit: &AuditStamp,
        version: AspectVersion,
        mode: WriteMode,
    ) -> StoreResult<()> {
        self.writer()?.save(urn, aspect, audit, version, mode)
    }

    fn add_with_outcome<M, F>(
        &self,
        urn: &U,
        update_fn: F,
        audit: &AuditStamp,
        max_retry: usize,
    ) -> StoreResult<AddOutcome<M>>
    where
        M: UnionMember<A>,
        F: FnMut(Option<&M>) -> StoreResult<M>,
    {
        self.writer()?
            .add_with_outcome(urn, update_fn, audit, max_retry)
    }

    fn new_numeric_id(&self) -> StoreResult<u64> {
        self.writer()?.new_numeric_id()
    }
}

fn open_sqlite(config: &StoreConfig) -> StoreResult<Arc<SqliteBackend>> {
    let backend = match &config.sqlite_path {
        Some(path) => SqliteBackend::open(path)?,
        None => SqliteBackend::open_in_memory()?,
    };
    Ok(Arc::new(backend))
}

/// Build a store from configuration
///
/// Read-only configurations load `config.snapshot`, whose values decode as
/// `M`, into a fresh in-memory database on every open. Mutable
/// configurations ignore `M`. SQLite backends get their schema from
/// `config.schema_script()` either way.
///
/// # Errors
///
/// `Config` for invalid settings, `ResourceInit` for an unreadable snapshot
/// or schema script, and whatever the bootstrap load raises.
pub fn open_store<U, A, M>(config: &StoreConfig) -> StoreResult<AspectStoreHandle<U, A>>
where
    U: EntityUrn,
    A: AspectUnion,
    M: UnionMember<A>,
{
    config.validate()?;
    let kind = config.backend_kind()?;

    let handle = match (&config.snapshot, config.read_only) {
        (Some(path), true) => {
            let file = File::open(path).map_err(|e| {
                StoreError::resource_init(format!(
                    "Failed to open snapshot '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            let entries = typed_entries::<U, A, M, _>(BufReader::new(file))?;
            let options = BootstrapOptions::default();
            let store = match kind {
                BackendKind::Memory => ImmutableAspectStore::with_backend(
                    Arc::new(MemoryBackend::new()),
                    entries,
                    true,
                    options,
                )?,
                BackendKind::Sqlite => ImmutableAspectStore::new(
                    Arc::new(SqliteBackend::open_in_memory()?),
                    &config.schema_script(),
                    entries,
                    options,
                )?,
            };
            AspectStoreHandle::Immutable(store)
        }
        _ => {
            let backend: Arc<dyn AspectBackend> = match kind {
                BackendKind::Memory => Arc::new(MemoryBackend::new()),
                BackendKind::Sqlite => {
                    let sqlite = open_sqlite(config)?;
                    sqlite.execute_script(&config.schema_script().load()?)?;
                    sqlite
                }
            };
            AspectStoreHandle::Mutable(
                LocalAspectStore::new(backend).with_retry_config(config.retry_config()),
            )
        }
    };

    info!(
        target: "aspectdb::store",
        backend = %config.backend,
        read_only = handle.is_read_only(),
        "Opened aspect store"
    );
    Ok(handle)
}
