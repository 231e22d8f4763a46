//! Read-only store bootstrapped from a snapshot
//!
//! `ImmutableAspectStore` loads every entry once, at construction, then
//! exposes only [`AspectReader`]. There is no `AspectWriter` impl, so
//! post-construction writes do not type-check.
//!
//! Two construction forms:
//!
//! | Form | Schema | Backend |
//! |------|--------|---------|
//! | [`ImmutableAspectStore::new`] | runs a schema script | any [`SchemaBackend`] |
//! | [`ImmutableAspectStore::with_backend`] | backend's own schema, if `generate_ddl` | any [`AspectBackend`] |
//!
//! Every entry is inserted at the latest slot with the bootstrap audit stamp,
//! in a single all-or-nothing batch. Construction either loads everything or
//! returns an error and leaves the backend as it found it.

use std::io::Read;
use std::sync::Arc;

use tracing::info;

use aspectdb_core::{
    AspectUnion, AspectVersion, AuditStamp, EntityUrn, ListResult, StoreResult, UnionMember,
    Versioned,
};
use aspectdb_storage::{AspectBackend, SchemaBackend, SchemaScript};

use crate::local::LocalAspectStore;
use crate::snapshot::load_aspects;
use crate::traits::AspectReader;

/// Settings for the bootstrap load
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapOptions {
    /// Stamp attached to every bootstrapped aspect
    ///
    /// Defaults to [`AuditStamp::bootstrap`]: actor `urn:li:dummy:unknown`,
    /// time 0.
    pub audit_stamp: AuditStamp,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            audit_stamp: AuditStamp::bootstrap(),
        }
    }
}

/// Read-only aspect store
pub struct ImmutableAspectStore<U: EntityUrn, A: AspectUnion> {
    inner: LocalAspectStore<U, A>,
    loaded: usize,
}

impl<U: EntityUrn, A: AspectUnion> ImmutableAspectStore<U, A> {
    /// Run `script` against `backend`, then load `entries`
    ///
    /// # Errors
    ///
    /// `ResourceInit` if the script cannot be read, `Storage` if it fails to
    /// execute or any entry fails to commit.
    pub fn new<B, I>(
        backend: Arc<B>,
        script: &SchemaScript,
        entries: I,
        options: BootstrapOptions,
    ) -> StoreResult<Self>
    where
        B: SchemaBackend + 'static,
        I: IntoIterator<Item = (U, A)>,
    {
        let sql = script.load()?;
        backend.execute_script(&sql)?;
        info!(
            target: "aspectdb::immutable",
            backend = backend.name(),
            script = %script.describe(),
            "Executed schema script"
        );
        Self::bootstrap(backend, entries, options)
    }

    /// Load `entries` into `backend`, optionally generating its schema first
    ///
    /// # Errors
    ///
    /// `Storage` if schema generation fails or any entry fails to commit.
    pub fn with_backend<I>(
        backend: Arc<dyn AspectBackend>,
        entries: I,
        generate_ddl: bool,
        options: BootstrapOptions,
    ) -> StoreResult<Self>
    where
        I: IntoIterator<Item = (U, A)>,
    {
        if generate_ddl {
            backend.ensure_schema()?;
        }
        Self::bootstrap(backend, entries, options)
    }

    /// Production form fed straight from a snapshot stream
    ///
    /// Snapshot values decode as `M`; keys narrow to `U`.
    pub fn from_reader<B, M, R>(
        backend: Arc<B>,
        script: &SchemaScript,
        reader: R,
        options: BootstrapOptions,
    ) -> StoreResult<Self>
    where
        B: SchemaBackend + 'static,
        M: UnionMember<A>,
        R: Read,
    {
        let entries = typed_entries::<U, A, M, R>(reader)?;
        Self::new(backend, script, entries, options)
    }

    fn bootstrap<I>(
        backend: Arc<dyn AspectBackend>,
        entries: I,
        options: BootstrapOptions,
    ) -> StoreResult<Self>
    where
        I: IntoIterator<Item = (U, A)>,
    {
        let inner = LocalAspectStore::new(backend);
        let loaded = inner.insert_all(entries, &options.audit_stamp)?;
        info!(
            target: "aspectdb::immutable",
            backend = inner.backend().name(),
            loaded,
            "Bootstrapped immutable store"
        );
        Ok(Self { inner, loaded })
    }

    /// Number of entries loaded at construction
    pub fn loaded(&self) -> usize {
        self.loaded
    }
}

/// Decode a snapshot and narrow it to a store's URN and union types
pub(crate) fn typed_entries<U, A, M, R>(reader: R) -> StoreResult<Vec<(U, A)>>
where
    U: EntityUrn,
    A: AspectUnion,
    M: UnionMember<A>,
    R: Read,
{
    load_aspects::<M, R>(reader)?
        .into_iter()
        .map(|(urn, aspect)| U::from_urn(urn).map(|urn| (urn, aspect.into_union())))
        .collect()
}

impl<U: EntityUrn, A: AspectUnion> std::fmt::Debug for ImmutableAspectStore<U, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImmutableAspectStore")
            .field("backend", &self.inner.backend().name())
            .field("loaded", &self.loaded)
            .finish()
    }
}

impl<U: EntityUrn, A: AspectUnion> AspectReader for ImmutableAspectStore<U, A> {
    type Urn = U;
    type Union = A;

    fn get_union(
        &self,
        urn: &U,
        kind: &str,
        version: AspectVersion,
    ) -> StoreResult<Option<Versioned<A>>> {
        self.inner.get_union(urn, kind, version)
    }

    fn list_versions(
        &self,
        urn: &U,
        kind: &str,
        start: usize,
        count: usize,
    ) -> StoreResult<ListResult<AspectVersion>> {
        self.inner.list_versions(urn, kind, start, count)
    }

    fn list_urns(&self, kind: &str) -> StoreResult<Vec<U>> {
        self.inner.list_urns(kind)
    }

    fn exists(&self, urn: &U) -> StoreResult<bool> {
        self.inner.exists(urn)
    }
}
