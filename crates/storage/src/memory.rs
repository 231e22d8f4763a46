//! In-memory sharded backend
//!
//! DashMap keyed by canonical URN, FxHashMap by aspect kind within.
//!
//! # Design
//!
//! - DashMap: 16-way sharded by default, lock-free reads
//! - FxHashMap: O(1) lookups, fast non-crypto hash
//! - Per-URN shard: writers to different entities never contend
//!
//! # Thread Safety
//!
//! Every mutation runs while holding the entry guard of the URN's shard, so
//! the check-then-write of `write` and `commit_latest` is atomic with
//! respect to every other writer of that entity.

use dashmap::DashMap;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use aspectdb_core::AspectVersion;

use crate::backend::{check_slot, AspectBackend};
use crate::error::BackendResult;
use crate::record::{AspectKey, AspectRecord, CommitOutcome, LatestRead, StoredAspect, WriteMode};

/// Slots of one (URN, aspect kind), indexed by version number
///
/// Slot 0 is the latest value; slot `i > 0` holds the `i`-th archived value.
#[derive(Debug, Clone, Default)]
pub struct VersionChain {
    slots: Vec<StoredAspect>,
}

impl VersionChain {
    /// Number of filled slots
    #[inline]
    pub fn len(&self) -> u64 {
        self.slots.len() as u64
    }

    /// True if nothing has been written
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Content of a slot
    pub fn get(&self, version: AspectVersion) -> Option<&StoredAspect> {
        usize::try_from(version.as_u64())
            .ok()
            .and_then(|i| self.slots.get(i))
    }

    /// Content of slot 0
    #[inline]
    pub fn latest(&self) -> Option<&StoredAspect> {
        self.slots.first()
    }

    /// Filled slot numbers, ascending
    pub fn versions(&self) -> Vec<AspectVersion> {
        (0..self.len()).map(AspectVersion::new).collect()
    }

    /// Place a record at a validated slot; returns what it replaced
    fn put(&mut self, version: AspectVersion, stored: StoredAspect) -> Option<StoredAspect> {
        let idx = version.as_u64() as usize;
        if idx == self.slots.len() {
            self.slots.push(stored);
            None
        } else {
            Some(std::mem::replace(&mut self.slots[idx], stored))
        }
    }

    /// Archive slot 0 at the end of the chain and install a new latest value
    fn advance(&mut self, record: AspectRecord) -> (Option<StoredAspect>, Option<AspectVersion>) {
        let archive_slot = AspectVersion::new(self.len());
        match self.slots.first_mut() {
            Some(current) => {
                let new_latest = record.at(AspectVersion::LATEST);
                let previous = std::mem::replace(current, new_latest);
                let mut archived = previous.clone();
                archived.version = archive_slot;
                self.slots.push(archived);
                (Some(previous), Some(archive_slot))
            }
            None => {
                self.slots.push(record.at(AspectVersion::LATEST));
                (None, None)
            }
        }
    }
}

/// Aspect chains of one entity
#[derive(Debug, Default)]
pub struct Shard {
    pub(crate) chains: FxHashMap<String, VersionChain>,
}

impl Shard {
    /// Number of aspect kinds stored for this entity
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// True if no aspect is stored
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

/// Sharded in-memory backend
pub struct MemoryBackend {
    shards: DashMap<String, Shard>,
    next_id: AtomicU64,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self {
            shards: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Create with expected number of entities
    pub fn with_capacity(entities: usize) -> Self {
        Self {
            shards: DashMap::with_capacity(entities),
            next_id: AtomicU64::new(0),
        }
    }

    /// Number of entities with at least one aspect
    pub fn entity_count(&self) -> usize {
        self.shards.iter().filter(|shard| !shard.is_empty()).count()
    }

    /// Drop chains created by a failed batch insert
    ///
    /// A chain another writer advanced past slot 0 in the meantime is kept.
    fn rollback_inserts(&self, keys: &[AspectKey]) {
        for key in keys {
            if let Some(mut shard) = self.shards.get_mut(&key.urn) {
                if shard.chains.get(&key.aspect).map_or(false, |c| c.len() == 1) {
                    shard.chains.remove(&key.aspect);
                }
            }
            self.shards.remove_if(&key.urn, |_, shard| shard.is_empty());
        }
    }

    /// Total number of stored slots across all chains
    pub fn total_slots(&self) -> u64 {
        self.shards
            .iter()
            .map(|shard| shard.chains.values().map(VersionChain::len).sum::<u64>())
            .sum()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("entities", &self.shards.len())
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}

impl AspectBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn ensure_schema(&self) -> BackendResult<()> {
        Ok(())
    }

    fn write(
        &self,
        key: &AspectKey,
        version: AspectVersion,
        record: AspectRecord,
        mode: WriteMode,
    ) -> BackendResult<Option<StoredAspect>> {
        let mut shard = self.shards.entry(key.urn.clone()).or_default();
        let count = shard.chains.get(&key.aspect).map_or(0, VersionChain::len);
        check_slot(key, version, mode, count)?;

        let chain = shard.chains.entry(key.aspect.clone()).or_default();
        Ok(chain.put(version, record.at(version)))
    }

    fn read(&self, key: &AspectKey, version: AspectVersion) -> BackendResult<Option<StoredAspect>> {
        Ok(self.shards.get(&key.urn).and_then(|shard| {
            shard
                .chains
                .get(&key.aspect)
                .and_then(|chain| chain.get(version).cloned())
        }))
    }

    fn read_latest(&self, key: &AspectKey) -> BackendResult<LatestRead> {
        let read = self
            .shards
            .get(&key.urn)
            .and_then(|shard| {
                shard.chains.get(&key.aspect).map(|chain| LatestRead {
                    latest: chain.latest().cloned(),
                    version_count: chain.len(),
                })
            })
            .unwrap_or(LatestRead {
                latest: None,
                version_count: 0,
            });
        Ok(read)
    }

    fn commit_latest(
        &self,
        key: &AspectKey,
        expected_count: u64,
        record: AspectRecord,
    ) -> BackendResult<CommitOutcome> {
        let mut shard = self.shards.entry(key.urn.clone()).or_default();
        let actual = shard.chains.get(&key.aspect).map_or(0, VersionChain::len);
        if actual != expected_count {
            debug!(
                target: "aspectdb::storage",
                urn = %key.urn,
                aspect = %key.aspect,
                expected = expected_count,
                actual,
                "Commit rejected: chain advanced"
            );
            return Ok(CommitOutcome::Conflict {
                expected: expected_count,
                actual,
            });
        }

        let chain = shard.chains.entry(key.aspect.clone()).or_default();
        let (previous, archived_at) = chain.advance(record);
        Ok(CommitOutcome::Committed {
            previous,
            archived_at,
        })
    }

    fn list_versions(&self, key: &AspectKey) -> BackendResult<Vec<AspectVersion>> {
        Ok(self
            .shards
            .get(&key.urn)
            .and_then(|shard| shard.chains.get(&key.aspect).map(VersionChain::versions))
            .unwrap_or_default())
    }

    fn list_urns(&self, aspect: &str) -> BackendResult<Vec<String>> {
        let mut urns: Vec<String> = self
            .shards
            .iter()
            .filter(|shard| shard.chains.get(aspect).map_or(false, |c| !c.is_empty()))
            .map(|shard| shard.key().clone())
            .collect();
        urns.sort();
        Ok(urns)
    }

    fn exists(&self, urn: &str) -> BackendResult<bool> {
        Ok(self
            .shards
            .get(urn)
            .map(|shard| !shard.is_empty())
            .unwrap_or(false))
    }

    fn next_numeric_id(&self) -> BackendResult<u64> {
        Ok(self.next_id.fetch_add(1, Ordering::AcqRel) + 1)
    }

    fn insert_latest_all(&self, records: Vec<(AspectKey, AspectRecord)>) -> BackendResult<()> {
        let mut inserted = Vec::with_capacity(records.len());
        for (key, record) in records {
            if let Err(e) = self.write(&key, AspectVersion::LATEST, record, WriteMode::Insert) {
                self.rollback_inserts(&inserted);
                debug!(
                    target: "aspectdb::storage",
                    rolled_back = inserted.len(),
                    error = %e,
                    "Batch insert rolled back"
                );
                return Err(e);
            }
            inserted.push(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aspectdb_core::{AuditStamp, Urn};
    use std::sync::Arc;
    use std::thread;

    static_assertions::assert_impl_all!(MemoryBackend: Send, Sync);

    fn key(urn: &str) -> AspectKey {
        AspectKey::new(urn, "DatasetProperties")
    }

    fn record(payload: &str) -> AspectRecord {
        let actor = Urn::parse("urn:li:corpuser:tester").unwrap();
        AspectRecord::new(payload.to_string(), AuditStamp::new(actor, 1))
    }

    #[test]
    fn test_new_backend_is_empty() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.entity_count(), 0);
        assert_eq!(backend.total_slots(), 0);
        assert!(!backend.exists("x:1").unwrap());
    }

    #[test]
    fn test_insert_then_read_latest() {
        let backend = MemoryBackend::new();
        let k = key("x:1");
        let prev = backend
            .write(&k, AspectVersion::LATEST, record("{}"), WriteMode::Insert)
            .unwrap();
        assert!(prev.is_none());

        let read = backend.read_latest(&k).unwrap();
        assert_eq!(read.version_count, 1);
        assert_eq!(read.latest.unwrap().payload, "{}");
        assert!(backend.exists("x:1").unwrap());
    }

    #[test]
    fn test_update_in_place_returns_previous() {
        let backend = MemoryBackend::new();
        let k = key("x:1");
        backend
            .write(&k, AspectVersion::LATEST, record("1"), WriteMode::Insert)
            .unwrap();
        let prev = backend
            .write(&k, AspectVersion::LATEST, record("2"), WriteMode::Update)
            .unwrap();
        assert_eq!(prev.unwrap().payload, "1");
        assert_eq!(backend.list_versions(&k).unwrap(), vec![AspectVersion::LATEST]);
    }

    #[test]
    fn test_commit_archives_previous_latest() {
        let backend = MemoryBackend::new();
        let k = key("x:1");
        assert!(backend.commit_latest(&k, 0, record("a")).unwrap().is_committed());
        assert!(backend.commit_latest(&k, 1, record("b")).unwrap().is_committed());
        let outcome = backend.commit_latest(&k, 2, record("c")).unwrap();
        match outcome {
            CommitOutcome::Committed {
                previous,
                archived_at,
            } => {
                assert_eq!(previous.unwrap().payload, "b");
                assert_eq!(archived_at, Some(AspectVersion::new(2)));
            }
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(backend.read(&k, AspectVersion::LATEST).unwrap().unwrap().payload, "c");
        assert_eq!(backend.read(&k, AspectVersion::new(1)).unwrap().unwrap().payload, "a");
        let archived = backend.read(&k, AspectVersion::new(2)).unwrap().unwrap();
        assert_eq!(archived.payload, "b");
        assert_eq!(archived.version, AspectVersion::new(2));
    }

    #[test]
    fn test_commit_with_stale_count_conflicts() {
        let backend = MemoryBackend::new();
        let k = key("x:1");
        backend.commit_latest(&k, 0, record("a")).unwrap();
        let outcome = backend.commit_latest(&k, 0, record("b")).unwrap();
        assert_eq!(
            outcome,
            CommitOutcome::Conflict {
                expected: 0,
                actual: 1
            }
        );
        assert_eq!(backend.read_latest(&k).unwrap().version_count, 1);
    }

    #[test]
    fn test_list_urns_sorted_per_aspect() {
        let backend = MemoryBackend::new();
        for urn in ["x:3", "x:1", "x:2"] {
            backend.commit_latest(&key(urn), 0, record("{}")).unwrap();
        }
        backend
            .commit_latest(&AspectKey::new("x:9", "Ownership"), 0, record("{}"))
            .unwrap();
        assert_eq!(backend.list_urns("DatasetProperties").unwrap(), vec!["x:1", "x:2", "x:3"]);
        assert_eq!(backend.list_urns("Ownership").unwrap(), vec!["x:9"]);
    }

    #[test]
    fn test_failed_batch_insert_leaves_nothing() {
        let backend = MemoryBackend::new();
        backend
            .write(&key("x:3"), AspectVersion::LATEST, record("seed"), WriteMode::Insert)
            .unwrap();

        let batch = vec![
            (key("x:1"), record("1")),
            (key("x:2"), record("2")),
            (key("x:3"), record("3")),
        ];
        assert!(backend.insert_latest_all(batch).is_err());

        assert!(!backend.exists("x:1").unwrap());
        assert!(!backend.exists("x:2").unwrap());
        assert_eq!(backend.entity_count(), 1);
        assert_eq!(backend.total_slots(), 1);
        assert_eq!(backend.read_latest(&key("x:3")).unwrap().latest.unwrap().payload, "seed");
    }

    #[test]
    fn test_batch_insert_rejects_repeated_key() {
        let backend = MemoryBackend::new();
        let batch = vec![(key("x:1"), record("a")), (key("x:1"), record("b"))];
        assert!(backend.insert_latest_all(batch).is_err());
        assert_eq!(backend.total_slots(), 0);
    }

    #[test]
    fn test_numeric_ids_unique_across_threads() {
        let backend = Arc::new(MemoryBackend::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let backend = Arc::clone(&backend);
                thread::spawn(move || {
                    (0..100)
                        .map(|_| backend.next_numeric_id().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 800);
        assert_eq!(all.first(), Some(&1));
    }
}
