//! SQLite backend
//!
//! Rows live in `metadata_aspect`, one per (urn, aspect, version), and ids
//! in `metadata_id`. A single connection sits behind a mutex; each
//! multi-statement operation runs in an IMMEDIATE transaction so the
//! count check of `commit_latest` and the writes that follow it cannot
//! interleave with another writer on the same file.
//!
//! `createdon` is stored as RFC 3339 text with millisecond precision.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, info};

use aspectdb_core::{AspectVersion, AuditStamp, Urn};

use crate::backend::{check_slot, AspectBackend, SchemaBackend, DEFAULT_ID_NAMESPACE};
use crate::error::{BackendError, BackendResult};
use crate::record::{AspectKey, AspectRecord, CommitOutcome, LatestRead, StoredAspect, WriteMode};
use crate::schema::BUNDLED_SCHEMA;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_SLOT: &str = "SELECT version, metadata, createdon, createdby, createdfor \
     FROM metadata_aspect WHERE urn = ?1 AND aspect = ?2 AND version = ?3";

const COUNT_SLOTS: &str = "SELECT COUNT(*) FROM metadata_aspect WHERE urn = ?1 AND aspect = ?2";

const INSERT_SLOT: &str = "INSERT INTO metadata_aspect \
     (urn, aspect, version, metadata, createdon, createdby, createdfor) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

const UPDATE_SLOT: &str = "UPDATE metadata_aspect \
     SET metadata = ?4, createdon = ?5, createdby = ?6, createdfor = ?7 \
     WHERE urn = ?1 AND aspect = ?2 AND version = ?3";

/// Row as read from `metadata_aspect`, before interpretation
struct RawRow {
    version: i64,
    metadata: String,
    createdon: String,
    createdby: String,
    createdfor: Option<String>,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawRow {
            version: row.get(0)?,
            metadata: row.get(1)?,
            createdon: row.get(2)?,
            createdby: row.get(3)?,
            createdfor: row.get(4)?,
        })
    }

    fn into_stored(self) -> BackendResult<StoredAspect> {
        let version = u64::try_from(self.version)
            .map_err(|_| BackendError::Corrupt(format!("negative version {}", self.version)))?;
        let time = DateTime::parse_from_rfc3339(&self.createdon)
            .map_err(|e| BackendError::Corrupt(format!("createdon '{}': {}", self.createdon, e)))?
            .timestamp_millis();
        let actor = parse_urn_column("createdby", &self.createdby)?;
        let mut audit = AuditStamp::new(actor, time);
        if let Some(raw) = self.createdfor.as_deref() {
            audit = audit.with_impersonator(parse_urn_column("createdfor", raw)?);
        }
        Ok(StoredAspect {
            version: AspectVersion::new(version),
            payload: self.metadata,
            audit,
        })
    }
}

fn parse_urn_column(column: &str, raw: &str) -> BackendResult<Urn> {
    Urn::parse(raw).map_err(|e| BackendError::Corrupt(format!("{column} '{raw}': {e}")))
}

fn version_param(version: AspectVersion) -> BackendResult<i64> {
    i64::try_from(version.as_u64())
        .map_err(|_| BackendError::Corrupt(format!("version {} exceeds column range", version)))
}

fn created_on(audit: &AuditStamp) -> BackendResult<String> {
    DateTime::from_timestamp_millis(audit.time)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .ok_or_else(|| BackendError::Corrupt(format!("audit time {} out of range", audit.time)))
}

fn read_slot(
    conn: &Connection,
    key: &AspectKey,
    version: AspectVersion,
) -> BackendResult<Option<StoredAspect>> {
    let raw = conn
        .query_row(
            SELECT_SLOT,
            params![key.urn, key.aspect, version_param(version)?],
            RawRow::from_row,
        )
        .optional()?;
    raw.map(RawRow::into_stored).transpose()
}

fn count_slots(conn: &Connection, key: &AspectKey) -> BackendResult<u64> {
    let count: i64 = conn.query_row(COUNT_SLOTS, params![key.urn, key.aspect], |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or(0))
}

fn put_slot(
    conn: &Connection,
    sql: &str,
    key: &AspectKey,
    version: AspectVersion,
    record: &AspectRecord,
) -> BackendResult<()> {
    conn.execute(
        sql,
        params![
            key.urn,
            key.aspect,
            version_param(version)?,
            record.payload,
            created_on(&record.audit)?,
            record.audit.actor.as_str(),
            record.audit.impersonator.as_ref().map(Urn::as_str),
        ],
    )?;
    Ok(())
}

/// Backend over a single SQLite connection
pub struct SqliteBackend {
    conn: Mutex<Connection>,
    location: Option<PathBuf>,
}

impl SqliteBackend {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> BackendResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        info!(target: "aspectdb::storage", path = %path.display(), "Opened sqlite backend");
        Ok(Self {
            conn: Mutex::new(conn),
            location: Some(path.to_path_buf()),
        })
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> BackendResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: None,
        })
    }

    /// Database file, `None` for in-memory databases
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("location", &self.location)
            .finish()
    }
}

impl AspectBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn ensure_schema(&self) -> BackendResult<()> {
        self.execute_script(BUNDLED_SCHEMA)
    }

    fn write(
        &self,
        key: &AspectKey,
        version: AspectVersion,
        record: AspectRecord,
        mode: WriteMode,
    ) -> BackendResult<Option<StoredAspect>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let count = count_slots(&tx, key)?;
        check_slot(key, version, mode, count)?;

        let previous = match mode {
            WriteMode::Insert => {
                put_slot(&tx, INSERT_SLOT, key, version, &record)?;
                None
            }
            WriteMode::Update => {
                let previous = read_slot(&tx, key, version)?;
                put_slot(&tx, UPDATE_SLOT, key, version, &record)?;
                previous
            }
        };

        tx.commit()?;
        Ok(previous)
    }

    fn read(&self, key: &AspectKey, version: AspectVersion) -> BackendResult<Option<StoredAspect>> {
        let conn = self.conn.lock();
        read_slot(&conn, key, version)
    }

    fn read_latest(&self, key: &AspectKey) -> BackendResult<LatestRead> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let latest = read_slot(&tx, key, AspectVersion::LATEST)?;
        let version_count = count_slots(&tx, key)?;
        tx.commit()?;
        Ok(LatestRead {
            latest,
            version_count,
        })
    }

    fn commit_latest(
        &self,
        key: &AspectKey,
        expected_count: u64,
        record: AspectRecord,
    ) -> BackendResult<CommitOutcome> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let actual = count_slots(&tx, key)?;
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

        let previous = read_slot(&tx, key, AspectVersion::LATEST)?;
        let archived_at = match previous {
            Some(_) => {
                let slot = AspectVersion::new(actual);
                tx.execute(
                    "UPDATE metadata_aspect SET version = ?3 \
                     WHERE urn = ?1 AND aspect = ?2 AND version = 0",
                    params![key.urn, key.aspect, version_param(slot)?],
                )?;
                Some(slot)
            }
            None => None,
        };
        put_slot(&tx, INSERT_SLOT, key, AspectVersion::LATEST, &record)?;
        tx.commit()?;

        Ok(CommitOutcome::Committed {
            previous,
            archived_at,
        })
    }

    fn list_versions(&self, key: &AspectKey) -> BackendResult<Vec<AspectVersion>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT version FROM metadata_aspect WHERE urn = ?1 AND aspect = ?2 ORDER BY version",
        )?;
        let rows = stmt.query_map(params![key.urn, key.aspect], |row| row.get::<_, i64>(0))?;
        let mut versions = Vec::new();
        for row in rows {
            let v = row?;
            let v = u64::try_from(v)
                .map_err(|_| BackendError::Corrupt(format!("negative version {}", v)))?;
            versions.push(AspectVersion::new(v));
        }
        Ok(versions)
    }

    fn list_urns(&self, aspect: &str) -> BackendResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT urn FROM metadata_aspect WHERE aspect = ?1 AND version = 0 ORDER BY urn",
        )?;
        let urns = stmt
            .query_map(params![aspect], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(urns)
    }

    fn exists(&self, urn: &str) -> BackendResult<bool> {
        let conn = self.conn.lock();
        let found: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM metadata_aspect WHERE urn = ?1)",
            params![urn],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    fn next_numeric_id(&self) -> BackendResult<u64> {
        let conn = self.conn.lock();
        let id: i64 = conn.query_row(
            "INSERT INTO metadata_id (namespace, id) \
             SELECT ?1, COALESCE(MAX(id), 0) + 1 FROM metadata_id WHERE namespace = ?1 \
             RETURNING id",
            params![DEFAULT_ID_NAMESPACE],
            |row| row.get(0),
        )?;
        u64::try_from(id).map_err(|_| BackendError::Corrupt(format!("negative id {}", id)))
    }

    fn insert_latest_all(&self, records: Vec<(AspectKey, AspectRecord)>) -> BackendResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for (key, record) in &records {
            let count = count_slots(&tx, key)?;
            check_slot(key, AspectVersion::LATEST, WriteMode::Insert, count)?;
            put_slot(&tx, INSERT_SLOT, key, AspectVersion::LATEST, record)?;
        }
        // Dropping an uncommitted transaction rolls it back
        tx.commit()?;
        debug!(target: "aspectdb::storage", inserted = records.len(), "Batch insert committed");
        Ok(())
    }
}

impl SchemaBackend for SqliteBackend {
    fn execute_script(&self, script: &str) -> BackendResult<()> {
        let conn = self.conn.lock();
        conn.execute_batch(script)?;
        debug!(target: "aspectdb::storage", "Executed schema script");
        Ok(())
    }
}
