//! Read and write capabilities
//!
//! Stores are split along two traits. Every store can be read; only stores
//! that accept writes implement [`AspectWriter`]. The immutable store
//! implements [`AspectReader`] alone, so a write against it does not
//! compile.
//!
//! Each trait has a small required core working on the aspect union and a
//! kind tag. Typed accessors (`get::<DatasetProperties>(..)`) are provided
//! on top of it.

use std::collections::BTreeMap;

use aspectdb_core::{
    AspectUnion, AspectVersion, AuditStamp, EntityUrn, ListResult, StoreError, StoreResult,
    UnionMember, Versioned,
};
use aspectdb_storage::WriteMode;

/// Read capability
pub trait AspectReader: Send + Sync {
    /// URN type accepted by this store
    type Urn: EntityUrn;
    /// Aspect union stored by this store
    type Union: AspectUnion;

    /// Value at a slot of the `kind` chain, with its version and audit stamp
    fn get_union(
        &self,
        urn: &Self::Urn,
        kind: &str,
        version: AspectVersion,
    ) -> StoreResult<Option<Versioned<Self::Union>>>;

    /// One page of the filled versions of a chain, ascending
    fn list_versions(
        &self,
        urn: &Self::Urn,
        kind: &str,
        start: usize,
        count: usize,
    ) -> StoreResult<ListResult<AspectVersion>>;

    /// Entities holding a latest value of `kind`, ascending
    fn list_urns(&self, kind: &str) -> StoreResult<Vec<Self::Urn>>;

    /// True if any aspect is stored for `urn`
    fn exists(&self, urn: &Self::Urn) -> StoreResult<bool>;

    /// Typed value with version and audit stamp
    fn get_with_audit<M>(
        &self,
        urn: &Self::Urn,
        version: AspectVersion,
    ) -> StoreResult<Option<Versioned<M>>>
    where
        M: UnionMember<Self::Union>,
    {
        self.get_union(urn, M::KIND, version)?
            .map(|stored| {
                stored.try_map(|value| {
                    let held = value.kind();
                    M::from_union(value).ok_or_else(|| {
                        StoreError::serialization(format!(
                            "expected aspect `{}`, found `{}`",
                            M::KIND,
                            held
                        ))
                    })
                })
            })
            .transpose()
    }

    /// Typed value at a slot
    fn get<M>(&self, urn: &Self::Urn, version: AspectVersion) -> StoreResult<Option<M>>
    where
        M: UnionMember<Self::Union>,
    {
        Ok(self
            .get_with_audit::<M>(urn, version)?
            .map(Versioned::into_value))
    }

    /// Typed latest value
    fn get_latest<M>(&self, urn: &Self::Urn) -> StoreResult<Option<M>>
    where
        M: UnionMember<Self::Union>,
    {
        self.get::<M>(urn, AspectVersion::LATEST)
    }

    /// Latest values of many entities; entities without one are omitted
    fn batch_get<M>(&self, urns: &[Self::Urn]) -> StoreResult<BTreeMap<Self::Urn, M>>
    where
        M: UnionMember<Self::Union>,
    {
        let mut found = BTreeMap::new();
        for urn in urns {
            if let Some(value) = self.get_latest::<M>(urn)? {
                found.insert(urn.clone(), value);
            }
        }
        Ok(found)
    }
}

/// Result of an `add`
#[derive(Debug, Clone, PartialEq)]
pub struct AddOutcome<M> {
    /// The latest value after the call
    pub value: M,
    /// Read-modify-write cycles used, at least 1
    pub attempts: usize,
    /// False when the updater returned the current value and nothing was written
    pub written: bool,
    /// Slot the superseded value was archived to
    pub archived_at: Option<AspectVersion>,
}

/// Write capability
pub trait AspectWriter: AspectReader {
    /// Write `aspect` at an explicit slot
    ///
    /// `Insert` requires the slot to be the next free one; `Update`
    /// overwrites a filled slot in place. Storage failures, including slot
    /// violations, surface as `StoreError::Storage` without retry.
    fn save(
        &self,
        urn: &Self::Urn,
        aspect: Self::Union,
        audit: &AuditStamp,
        version: AspectVersion,
        mode: WriteMode,
    ) -> StoreResult<()>;

    /// Optimistic read-modify-write of the latest value
    ///
    /// `update_fn` receives the current latest value (`None` when absent).
    /// A version conflict restarts the cycle; after `max_retry + 1` attempts
    /// the call fails with `StoreError::ConcurrencyExhausted`. Errors from
    /// `update_fn` propagate immediately.
    fn add_with_outcome<M, F>(
        &self,
        urn: &Self::Urn,
        update_fn: F,
        audit: &AuditStamp,
        max_retry: usize,
    ) -> StoreResult<AddOutcome<M>>
    where
        M: UnionMember<Self::Union>,
        F: FnMut(Option<&M>) -> StoreResult<M>;

    /// Allocate an id unique within this store
    fn new_numeric_id(&self) -> StoreResult<u64>;

    /// [`add_with_outcome`](Self::add_with_outcome), returning the latest value
    fn add<M, F>(
        &self,
        urn: &Self::Urn,
        update_fn: F,
        audit: &AuditStamp,
        max_retry: usize,
    ) -> StoreResult<M>
    where
        M: UnionMember<Self::Union>,
        F: FnMut(Option<&M>) -> StoreResult<M>,
    {
        self.add_with_outcome(urn, update_fn, audit, max_retry)
            .map(|outcome| outcome.value)
    }
}
