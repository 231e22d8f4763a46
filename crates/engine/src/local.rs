//! Local aspect store
//!
//! `LocalAspectStore` owns the mapping (URN, aspect kind, version) → aspect
//! over a single [`AspectBackend`]. It encodes aspects to JSON payloads,
//! applies the write policies, and fires a [`ChangeNotifier`] after every
//! committed write.
//!
//! ## Versioning
//!
//! | Slot | Holds |
//! |------|-------|
//! | `0` | newest value |
//! | `1..n` | superseded values, in the order they were superseded |
//!
//! `save` writes one explicit slot. `add` is the optimistic path: it reads
//! slot 0 with the chain length, computes the new value, and commits only if
//! the chain length is unchanged, archiving the previous value at slot `n`.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, warn};

use aspectdb_core::{
    AspectUnion, AspectVersion, AuditStamp, ChangeEvent, EntityUrn, ListResult, StoreError,
    StoreResult, UnionMember, Urn, Versioned,
};
use aspectdb_storage::{
    AspectBackend, AspectKey, AspectRecord, CommitOutcome, StoredAspect, WriteMode,
};

use crate::notifier::{ChangeNotifier, NoopNotifier};
use crate::retry::{RetryConfig, WriteCounters, WriteMetrics};
use crate::traits::{AddOutcome, AspectReader, AspectWriter};

/// Versioned aspect store over one backend
pub struct LocalAspectStore<U: EntityUrn, A: AspectUnion> {
    backend: Arc<dyn AspectBackend>,
    notifier: Arc<dyn ChangeNotifier<U, A>>,
    retry: RetryConfig,
    counters: WriteCounters,
    _marker: PhantomData<fn() -> (U, A)>,
}

impl<U: EntityUrn, A: AspectUnion> LocalAspectStore<U, A> {
    /// Create a store that publishes nothing
    pub fn new(backend: Arc<dyn AspectBackend>) -> Self {
        Self::with_notifier(backend, Arc::new(NoopNotifier))
    }

    /// Create a store that publishes to `notifier`
    pub fn with_notifier(
        backend: Arc<dyn AspectBackend>,
        notifier: Arc<dyn ChangeNotifier<U, A>>,
    ) -> Self {
        Self {
            backend,
            notifier,
            retry: RetryConfig::default(),
            counters: WriteCounters::default(),
            _marker: PhantomData,
        }
    }

    /// Replace the retry configuration
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Retry configuration in effect
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Backend this store writes to
    pub fn backend(&self) -> &Arc<dyn AspectBackend> {
        &self.backend
    }

    /// Snapshot of the write counters
    pub fn metrics(&self) -> WriteMetrics {
        self.counters.snapshot()
    }

    /// `add` using the configured retry budget
    pub fn add_default<M, F>(&self, urn: &U, update_fn: F, audit: &AuditStamp) -> StoreResult<M>
    where
        M: UnionMember<A>,
        F: FnMut(Option<&M>) -> StoreResult<M>,
    {
        self.add(urn, update_fn, audit, self.retry.max_retries)
    }

    /// Insert every entry at the latest slot of an empty chain in one batch
    ///
    /// Either all entries are written or none are. Events fire only after
    /// the whole batch has committed.
    pub(crate) fn insert_all<I>(&self, entries: I, audit: &AuditStamp) -> StoreResult<usize>
    where
        I: IntoIterator<Item = (U, A)>,
    {
        let entries: Vec<(U, A)> = entries.into_iter().collect();
        let records = entries
            .iter()
            .map(|(urn, aspect)| -> StoreResult<(AspectKey, AspectRecord)> {
                let record = AspectRecord::new(aspect.to_payload()?, audit.clone());
                Ok((Self::key(urn, aspect.kind()), record))
            })
            .collect::<StoreResult<Vec<_>>>()?;

        self.backend.insert_latest_all(records)?;
        let inserted = entries.len();
        for (urn, aspect) in entries {
            self.counters.record_save();
            self.publish(ChangeEvent {
                urn,
                old_value: None,
                new_value: aspect,
                version: AspectVersion::LATEST,
                audit_stamp: audit.clone(),
            });
        }
        debug!(target: "aspectdb::store", inserted, "Inserted batch at latest slot");
        Ok(inserted)
    }

    fn key(urn: &U, kind: &str) -> AspectKey {
        AspectKey::new(urn.as_urn().as_str(), kind)
    }

    fn decode(kind: &str, stored: StoredAspect) -> StoreResult<Versioned<A>> {
        let value = A::from_payload(kind, &stored.payload)?;
        Ok(Versioned::new(value, stored.version, stored.audit))
    }

    fn decode_member<M: UnionMember<A>>(stored: &StoredAspect) -> StoreResult<M> {
        aspectdb_core::aspect::decode_payload::<M>(&stored.payload)
    }

    /// Deliver an event; failures are logged only
    fn publish(&self, event: ChangeEvent<U, A>) {
        if let Err(e) = self.notifier.notify(&event) {
            warn!(
                target: "aspectdb::store",
                urn = %event.urn.as_urn(),
                aspect = event.aspect_kind(),
                error = %e,
                "Change notification failed"
            );
        }
    }

    /// Decode the value a write displaced, for the change event
    fn displaced(&self, kind: &str, previous: Option<StoredAspect>) -> Option<A> {
        let previous = previous?;
        match A::from_payload(kind, &previous.payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    target: "aspectdb::store",
                    aspect = kind,
                    version = %previous.version,
                    error = %e,
                    "Displaced value could not be decoded"
                );
                None
            }
        }
    }
}

impl<U: EntityUrn, A: AspectUnion> std::fmt::Debug for LocalAspectStore<U, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAspectStore")
            .field("backend", &self.backend.name())
            .field("retry", &self.retry)
            .finish()
    }
}

impl<U: EntityUrn, A: AspectUnion> AspectReader for LocalAspectStore<U, A> {
    type Urn = U;
    type Union = A;

    fn get_union(
        &self,
        urn: &U,
        kind: &str,
        version: AspectVersion,
    ) -> StoreResult<Option<Versioned<A>>> {
        let stored = self.backend.read(&Self::key(urn, kind), version)?;
        stored.map(|s| Self::decode(kind, s)).transpose()
    }

    fn list_versions(
        &self,
        urn: &U,
        kind: &str,
        start: usize,
        count: usize,
    ) -> StoreResult<ListResult<AspectVersion>> {
        let all = self.backend.list_versions(&Self::key(urn, kind))?;
        Ok(ListResult::paginate(all, start, count))
    }

    fn list_urns(&self, kind: &str) -> StoreResult<Vec<U>> {
        self.backend
            .list_urns(kind)?
            .iter()
            .map(|raw| Urn::parse(raw).and_then(U::from_urn))
            .collect()
    }

    fn exists(&self, urn: &U) -> StoreResult<bool> {
        Ok(self.backend.exists(urn.as_urn().as_str())?)
    }
}

impl<U: EntityUrn, A: AspectUnion> AspectWriter for LocalAspectStore<U, A> {
    fn save(
        &self,
        urn: &U,
        aspect: A,
        audit: &AuditStamp,
        version: AspectVersion,
        mode: WriteMode,
    ) -> StoreResult<()> {
        let kind = aspect.kind();
        let key = Self::key(urn, kind);
        let record = AspectRecord::new(aspect.to_payload()?, audit.clone());

        let previous = self.backend.write(&key, version, record, mode)?;
        self.counters.record_save();
        debug!(
            target: "aspectdb::store",
            urn = %key.urn,
            aspect = kind,
            %version,
            ?mode,
            "Saved aspect"
        );

        let old_value = self.displaced(kind, previous);
        self.publish(ChangeEvent {
            urn: urn.clone(),
            old_value,
            new_value: aspect,
            version,
            audit_stamp: audit.clone(),
        });
        Ok(())
    }

    fn add_with_outcome<M, F>(
        &self,
        urn: &U,
        mut update_fn: F,
        audit: &AuditStamp,
        max_retry: usize,
    ) -> StoreResult<AddOutcome<M>>
    where
        M: UnionMember<A>,
        F: FnMut(Option<&M>) -> StoreResult<M>,
    {
        let key = Self::key(urn, M::KIND);
        self.counters.record_add_call();

        for attempt in 0..=max_retry {
            self.counters.record_attempt();
            let read = self.backend.read_latest(&key)?;
            let current = read
                .latest
                .as_ref()
                .map(Self::decode_member::<M>)
                .transpose()?;

            let new_value = update_fn(current.as_ref())?;
            if current.as_ref() == Some(&new_value) {
                self.counters.record_unchanged();
                debug!(
                    target: "aspectdb::store",
                    urn = %key.urn,
                    aspect = M::KIND,
                    "Updater returned the current value; nothing written"
                );
                return Ok(AddOutcome {
                    value: new_value,
                    attempts: attempt + 1,
                    written: false,
                    archived_at: None,
                });
            }

            let payload = aspectdb_core::aspect::encode_payload(&new_value)?;
            let record = AspectRecord::new(payload, audit.clone());
            match self
                .backend
                .commit_latest(&key, read.version_count, record)?
            {
                CommitOutcome::Committed {
                    previous,
                    archived_at,
                } => {
                    self.counters.record_commit();
                    debug!(
                        target: "aspectdb::store",
                        urn = %key.urn,
                        aspect = M::KIND,
                        attempts = attempt + 1,
                        archived_at = ?archived_at.map(|v| v.as_u64()),
                        "Committed latest aspect"
                    );
                    let old_value = self.displaced(M::KIND, previous);
                    self.publish(ChangeEvent {
                        urn: urn.clone(),
                        old_value,
                        new_value: new_value.clone().into_union(),
                        version: AspectVersion::LATEST,
                        audit_stamp: audit.clone(),
                    });
                    return Ok(AddOutcome {
                        value: new_value,
                        attempts: attempt + 1,
                        written: true,
                        archived_at,
                    });
                }
                CommitOutcome::Conflict { expected, actual } => {
                    self.counters.record_conflict();
                    debug!(
                        target: "aspectdb::store",
                        urn = %key.urn,
                        aspect = M::KIND,
                        attempt,
                        expected,
                        actual,
                        "Version conflict"
                    );
                    if attempt < max_retry {
                        std::thread::sleep(self.retry.backoff(
                            u32::try_from(attempt.saturating_add(1)).unwrap_or(u32::MAX),
                        ));
                    }
                }
            }
        }

        self.counters.record_exhausted();
        warn!(
            target: "aspectdb::store",
            urn = %key.urn,
            aspect = M::KIND,
            attempts = max_retry + 1,
            "Retry budget exhausted"
        );
        Err(StoreError::ConcurrencyExhausted {
            urn: key.urn,
            aspect: M::KIND.to_string(),
            attempts: max_retry.saturating_add(1),
        })
    }

    fn new_numeric_id(&self) -> StoreResult<u64> {
        Ok(self.backend.next_numeric_id()?)
    }
}
