//! SQLite storage implementation.
//!
//! [`SqliteStorage`] is the production [`StateStore`]. It follows the
//! MutationContext pattern: every write runs inside an IMMEDIATE transaction
//! that also appends the audit events the closure recorded.

use crate::error::{Error, Result};
use crate::model::{LifecycleStatus, TrackedRecord};
use crate::storage::audit::{get_events, insert_event, AuditEvent, EventType};
use crate::storage::schema::apply_schema;
use crate::storage::StateStore;
use crate::sync::{RunSummary, SyncReport};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Actor recorded in the audit log when none is configured.
pub const DEFAULT_ACTOR: &str = "evsync";

/// A run lock older than this is considered abandoned.
pub const STALE_LOCK_AFTER_MS: i64 = 2 * 60 * 60 * 1000;

const ENTITY_RECORD: &str = "tracked_event";
const ENTITY_LOCK: &str = "sync_lock";
const ENTITY_RUN: &str = "sync_run";

const RECORD_COLUMNS: &str =
    "event_id, content_item_id, event_data, content_hash, post_status, last_updated";

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
    actor: String,
}

/// Context for a mutation operation, collecting audit events.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Actor performing the operation (`cli`, `watch`, ...).
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<AuditEvent>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event for this operation.
    pub fn record_event(&mut self, entity_type: &str, entity_id: &str, event_type: EventType) {
        self.events.push(
            AuditEvent::new(entity_type, entity_id, event_type, &self.actor)
                .with_comment(&self.op_name),
        );
    }

    /// Record an event with old/new values for field tracking.
    pub fn record_change(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        self.events.push(
            AuditEvent::new(entity_type, entity_id, event_type, &self.actor)
                .with_values(old_value, new_value)
                .with_comment(&self.op_name),
        );
    }
}

/// The live run lock for an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunLock {
    pub org_id: String,
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
}

/// Tracked record counts by lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecordCounts {
    pub active: usize,
    pub retired: usize,
}

impl RecordCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.active + self.retired
    }
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the parent directory and database if needed and applies the
    /// schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(timeout_ms.map_or(Duration::from_secs(5), Duration::from_millis))?;

        apply_schema(&conn)?;
        Ok(Self {
            conn,
            actor: DEFAULT_ACTOR.to_string(),
        })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            conn,
            actor: DEFAULT_ACTOR.to_string(),
        })
    }

    /// Set the actor recorded on audit events.
    #[must_use]
    pub fn with_actor(mut self, actor: &str) -> Self {
        self.actor = actor.to_string();
        self
    }

    #[must_use]
    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// This method:
    /// 1. Begins an IMMEDIATE transaction (for write locking)
    /// 2. Executes the mutation closure
    /// 3. Writes audit events
    /// 4. Commits (or rolls back on error)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let mut ctx = MutationContext::new(op, &self.actor);
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;

        Ok(result)
    }

    // ==================
    // Record Queries
    // ==================

    /// List tracked records, optionally filtered by status, most recently
    /// updated first.
    ///
    /// Rows whose snapshot cannot be decoded are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_records(
        &self,
        status: Option<LifecycleStatus>,
        limit: Option<u32>,
    ) -> Result<Vec<TrackedRecord>> {
        let limit = limit.unwrap_or(1000);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM tracked_events
             WHERE (?1 IS NULL OR post_status = ?1)
             ORDER BY last_updated DESC, event_id
             LIMIT ?2"
        ))?;

        let rows = stmt
            .query_map(
                rusqlite::params![status.map(|s| s.as_str()), limit],
                map_record_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(decode_rows(rows))
    }

    /// Count tracked records by status.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_records(&self) -> Result<RecordCounts> {
        let mut stmt = self
            .conn
            .prepare("SELECT post_status, COUNT(*) FROM tracked_events GROUP BY post_status")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

        let mut counts = RecordCounts::default();
        for row in rows {
            let (status, n) = row?;
            let n = usize::try_from(n).unwrap_or(0);
            match status.parse::<LifecycleStatus>() {
                Ok(LifecycleStatus::Active) => counts.active += n,
                Ok(LifecycleStatus::Retired) => counts.retired += n,
                Err(e) => warn!(error = %e, "Skipping unknown record status"),
            }
        }
        Ok(counts)
    }

    /// The current run lock for an organization, live or stale.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn current_lock(&self, org_id: &str) -> Result<Option<RunLock>> {
        let row = self
            .conn
            .query_row(
                "SELECT holder, acquired_at FROM sync_locks WHERE org_id = ?1",
                [org_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        row.map(|(holder, acquired_at)| {
            Ok(RunLock {
                org_id: org_id.to_string(),
                holder,
                acquired_at: millis_to_datetime(acquired_at)?,
            })
        })
        .transpose()
    }

    /// The most recent run summary for an organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn last_run(&self, org_id: &str) -> Result<Option<RunSummary>> {
        let row = self
            .conn
            .query_row(
                "SELECT fetched, processed, created, updated, unchanged, retired, errors, finished_at
                 FROM sync_runs WHERE org_id = ?1
                 ORDER BY finished_at DESC, id DESC LIMIT 1",
                [org_id],
                |row| {
                    let count = |i: usize| -> rusqlite::Result<usize> {
                        Ok(usize::try_from(row.get::<_, i64>(i)?).unwrap_or(0))
                    };
                    Ok((
                        SyncReport {
                            fetched: count(0)?,
                            processed: count(1)?,
                            created: count(2)?,
                            updated: count(3)?,
                            unchanged: count(4)?,
                            retired: count(5)?,
                            errors: count(6)?,
                        },
                        row.get::<_, i64>(7)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(report, finished_at)| {
            Ok(RunSummary {
                org_id: org_id.to_string(),
                report,
                finished_at: millis_to_datetime(finished_at)?,
            })
        })
        .transpose()
    }

    /// Audit history for one tracked event, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn record_history(&self, event_id: &str, limit: Option<u32>) -> Result<Vec<AuditEvent>> {
        Ok(get_events(&self.conn, ENTITY_RECORD, event_id, limit)?)
    }
}

impl StateStore for SqliteStorage {
    fn get(&self, event_id: &str) -> Result<Option<TrackedRecord>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM tracked_events WHERE event_id = ?1"),
                [event_id],
                map_record_row,
            )
            .optional()?;

        row.map(RecordRow::into_record).transpose()
    }

    fn upsert(&mut self, record: &TrackedRecord) -> Result<()> {
        let event_data = serde_json::to_string(&record.snapshot)?;
        let ends_at = record.snapshot.ends_at.map(|end| end.timestamp());

        self.mutate("upsert_record", |tx, ctx| {
            let previous_hash: Option<String> = tx
                .query_row(
                    "SELECT content_hash FROM tracked_events WHERE event_id = ?1",
                    [&record.event_id],
                    |row| row.get(0),
                )
                .optional()?;

            tx.execute(
                "INSERT INTO tracked_events (event_id, content_item_id, event_data, content_hash, ends_at, post_status, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(event_id) DO UPDATE SET
                    content_item_id = excluded.content_item_id,
                    event_data = excluded.event_data,
                    content_hash = excluded.content_hash,
                    ends_at = excluded.ends_at,
                    post_status = excluded.post_status,
                    last_updated = excluded.last_updated",
                rusqlite::params![
                    record.event_id,
                    record.content_item_id,
                    event_data,
                    record.content_hash,
                    ends_at,
                    record.status.as_str(),
                    record.last_updated.timestamp_millis(),
                ],
            )?;

            match previous_hash {
                None => ctx.record_event(ENTITY_RECORD, &record.event_id, EventType::RecordCreated),
                Some(old) if old != record.content_hash => ctx.record_change(
                    ENTITY_RECORD,
                    &record.event_id,
                    EventType::RecordUpdated,
                    Some(old),
                    Some(record.content_hash.clone()),
                ),
                Some(_) => {}
            }

            Ok(())
        })
    }

    fn list_active_ended_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<TrackedRecord>> {
        // The column is whole seconds; the exact comparison runs on the snapshot.
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM tracked_events
             WHERE post_status = 'active' AND ends_at IS NOT NULL AND ends_at <= ?1
             ORDER BY ends_at, event_id"
        ))?;

        let rows = stmt
            .query_map([cutoff.timestamp()], map_record_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(decode_rows(rows)
            .into_iter()
            .filter(|record| record.snapshot.ended_before(cutoff))
            .collect())
    }

    fn mark_retired(&mut self, event_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.mutate("mark_retired", |tx, ctx| {
            let changed = tx.execute(
                "UPDATE tracked_events SET post_status = ?2, last_updated = ?3 WHERE event_id = ?1",
                rusqlite::params![
                    event_id,
                    LifecycleStatus::Retired.as_str(),
                    at.timestamp_millis()
                ],
            )?;
            if changed == 0 {
                return Err(Error::RecordNotFound {
                    event_id: event_id.to_string(),
                });
            }

            ctx.record_event(ENTITY_RECORD, event_id, EventType::RecordRetired);
            Ok(())
        })
    }

    fn try_acquire_run_lock(&mut self, org_id: &str, holder: &str, now: DateTime<Utc>) -> Result<bool> {
        let now_ms = now.timestamp_millis();

        self.mutate("acquire_run_lock", |tx, ctx| {
            let existing: Option<(String, i64)> = tx
                .query_row(
                    "SELECT holder, acquired_at FROM sync_locks WHERE org_id = ?1",
                    [org_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            if let Some((held_by, acquired_at)) = existing {
                if now_ms - acquired_at < STALE_LOCK_AFTER_MS {
                    debug!(org = org_id, holder = %held_by, "Run lock is held");
                    return Ok(false);
                }
                warn!(org = org_id, holder = %held_by, "Reclaiming stale run lock");
                ctx.record_change(
                    ENTITY_LOCK,
                    org_id,
                    EventType::LockReclaimed,
                    Some(held_by),
                    Some(holder.to_string()),
                );
            }

            tx.execute(
                "INSERT INTO sync_locks (org_id, holder, acquired_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(org_id) DO UPDATE SET holder = excluded.holder, acquired_at = excluded.acquired_at",
                rusqlite::params![org_id, holder, now_ms],
            )?;
            ctx.record_change(
                ENTITY_LOCK,
                org_id,
                EventType::LockAcquired,
                None,
                Some(holder.to_string()),
            );

            Ok(true)
        })
    }

    fn release_run_lock(&mut self, org_id: &str, holder: &str) -> Result<()> {
        self.mutate("release_run_lock", |tx, ctx| {
            let released = tx.execute(
                "DELETE FROM sync_locks WHERE org_id = ?1 AND holder = ?2",
                rusqlite::params![org_id, holder],
            )?;
            if released > 0 {
                ctx.record_change(
                    ENTITY_LOCK,
                    org_id,
                    EventType::LockReleased,
                    Some(holder.to_string()),
                    None,
                );
            } else {
                warn!(org = org_id, holder, "Run lock was no longer held at release");
            }
            Ok(())
        })
    }

    fn record_run(&mut self, org_id: &str, report: &SyncReport, finished_at: DateTime<Utc>) -> Result<()> {
        let summary = serde_json::to_string(report)?;
        let finished_at = finished_at.timestamp_millis();

        self.mutate("record_run", |tx, ctx| {
            tx.execute(
                "INSERT INTO sync_runs (org_id, fetched, processed, created, updated, unchanged, retired, errors, finished_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    org_id,
                    count_param(report.fetched),
                    count_param(report.processed),
                    count_param(report.created),
                    count_param(report.updated),
                    count_param(report.unchanged),
                    count_param(report.retired),
                    count_param(report.errors),
                    finished_at,
                ],
            )?;
            ctx.record_change(ENTITY_RUN, org_id, EventType::RunRecorded, None, Some(summary));
            Ok(())
        })
    }
}

/// A `tracked_events` row before its snapshot is decoded.
struct RecordRow {
    event_id: String,
    content_item_id: String,
    event_data: String,
    content_hash: String,
    post_status: String,
    last_updated: i64,
}

impl RecordRow {
    fn into_record(self) -> Result<TrackedRecord> {
        let snapshot = serde_json::from_str(&self.event_data)?;
        let status = self
            .post_status
            .parse::<LifecycleStatus>()
            .map_err(Error::Other)?;

        Ok(TrackedRecord {
            event_id: self.event_id,
            content_item_id: self.content_item_id,
            snapshot,
            content_hash: self.content_hash,
            status,
            last_updated: millis_to_datetime(self.last_updated)?,
        })
    }
}

fn map_record_row(row: &rusqlite::Row) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        event_id: row.get(0)?,
        content_item_id: row.get(1)?,
        event_data: row.get(2)?,
        content_hash: row.get(3)?,
        post_status: row.get(4)?,
        last_updated: row.get(5)?,
    })
}

/// Decode rows, skipping corrupt ones.
fn decode_rows(rows: Vec<RecordRow>) -> Vec<TrackedRecord> {
    rows.into_iter()
        .filter_map(|row| {
            let event_id = row.event_id.clone();
            row.into_record()
                .map_err(|e| warn!(event_id = %event_id, error = %e, "Skipping corrupt tracked record"))
                .ok()
        })
        .collect()
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| Error::Other(format!("Timestamp out of range: {ms}")))
}

fn count_param(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Event;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn event(id: &str, ends_at: Option<i64>) -> Event {
        Event {
            id: id.to_string(),
            title: format!("Event {id}"),
            listed_at: at(1_740_000_000),
            starts_at: at(1_740_000_000),
            ends_at: ends_at.map(at),
            location_text: Some("Main Hall".into()),
            address: None,
            description_html: Some("<p>Hi</p>".into()),
            registration_path: Some(format!("2025/{id}")),
            image_url: None,
            excerpt: "March 1".into(),
            content: "<p>body</p>".into(),
        }
    }

    fn record(id: &str, ends_at: Option<i64>) -> TrackedRecord {
        TrackedRecord::new(
            format!("item_{id}"),
            event(id, ends_at),
            "hash-1".into(),
            at(1_740_000_100),
        )
    }

    #[test]
    fn test_open_memory() {
        let storage = SqliteStorage::open_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("evsync.db");
        SqliteStorage::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_upsert_get_roundtrip() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let original = record("e1", Some(1_740_007_200));

        storage.upsert(&original).unwrap();
        let loaded = storage.get("e1").unwrap().unwrap();
        assert_eq!(loaded, original);

        assert!(storage.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_upsert_never_duplicates() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut rec = record("e1", None);
        storage.upsert(&rec).unwrap();

        rec.content_hash = "hash-2".into();
        rec.snapshot.title = "Renamed".into();
        rec.last_updated = at(1_740_000_500);
        storage.upsert(&rec).unwrap();

        let count: i64 = storage
            .conn()
            .query_row("SELECT COUNT(*) FROM tracked_events", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);

        let loaded = storage.get("e1").unwrap().unwrap();
        assert_eq!(loaded.snapshot.title, "Renamed");
        assert_eq!(loaded.content_hash, "hash-2");
        assert_eq!(loaded.last_updated, at(1_740_000_500));
    }

    #[test]
    fn test_upsert_audits_creation_and_hash_changes_only() {
        let mut storage = SqliteStorage::open_memory().unwrap().with_actor("test");
        let mut rec = record("e1", None);
        storage.upsert(&rec).unwrap();
        storage.upsert(&rec).unwrap();
        rec.content_hash = "hash-2".into();
        storage.upsert(&rec).unwrap();

        let history = storage.record_history("e1", None).unwrap();
        let types: Vec<_> = history.iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![EventType::RecordUpdated, EventType::RecordCreated]);
        assert_eq!(history[0].old_value.as_deref(), Some("hash-1"));
        assert_eq!(history[0].actor, "test");
    }

    #[test]
    fn test_list_active_ended_before() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.upsert(&record("past", Some(1_000))).unwrap();
        storage.upsert(&record("boundary", Some(2_000))).unwrap();
        storage.upsert(&record("future", Some(9_000))).unwrap();
        storage.upsert(&record("open_ended", None)).unwrap();

        let mut retired = record("retired", Some(500));
        retired.status = LifecycleStatus::Retired;
        storage.upsert(&retired).unwrap();

        let ended = storage.list_active_ended_before(at(2_000)).unwrap();
        let ids: Vec<_> = ended.iter().map(|r| r.event_id.as_str()).collect();
        assert_eq!(ids, vec!["past"]);

        let ended = storage
            .list_active_ended_before(at(2_000) + chrono::TimeDelta::milliseconds(1))
            .unwrap();
        let ids: Vec<_> = ended.iter().map(|r| r.event_id.as_str()).collect();
        assert_eq!(ids, vec!["past", "boundary"]);
    }

    #[test]
    fn test_corrupt_rows_are_skipped() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.upsert(&record("good", Some(1_000))).unwrap();
        storage
            .conn()
            .execute(
                "INSERT INTO tracked_events (event_id, content_item_id, event_data, content_hash, ends_at, post_status, last_updated)
                 VALUES ('bad', 'item_bad', '{not json', 'h', 1000, 'active', 0)",
                [],
            )
            .unwrap();

        let ended = storage.list_active_ended_before(at(5_000)).unwrap();
        assert_eq!(ended.len(), 1);
        assert_eq!(ended[0].event_id, "good");

        assert!(matches!(storage.get("bad"), Err(Error::Json(_))));
    }

    #[test]
    fn test_mark_retired() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.upsert(&record("e1", Some(1_000))).unwrap();

        storage.mark_retired("e1", at(3_000)).unwrap();
        let loaded = storage.get("e1").unwrap().unwrap();
        assert_eq!(loaded.status, LifecycleStatus::Retired);
        assert_eq!(loaded.last_updated, at(3_000));
        assert!(storage.list_active_ended_before(at(5_000)).unwrap().is_empty());

        let err = storage.mark_retired("missing", at(3_000)).unwrap_err();
        assert!(matches!(err, Error::RecordNotFound { .. }));
    }

    #[test]
    fn test_record_counts_and_listing() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.upsert(&record("a", Some(1_000))).unwrap();
        storage.upsert(&record("b", None)).unwrap();
        storage.mark_retired("a", at(2_000)).unwrap();

        let counts = storage.count_records().unwrap();
        assert_eq!(counts, RecordCounts { active: 1, retired: 1 });
        assert_eq!(counts.total(), 2);

        let retired = storage.list_records(Some(LifecycleStatus::Retired), None).unwrap();
        assert_eq!(retired.len(), 1);
        assert_eq!(retired[0].event_id, "a");
        assert_eq!(storage.list_records(None, None).unwrap().len(), 2);
    }

    #[test]
    fn test_run_lock_fails_fast_when_held() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let now = at(1_740_000_000);

        assert!(storage.try_acquire_run_lock("acme", "run-a", now).unwrap());
        assert!(!storage.try_acquire_run_lock("acme", "run-b", now).unwrap());
        assert!(storage.try_acquire_run_lock("other", "run-b", now).unwrap());

        let lock = storage.current_lock("acme").unwrap().unwrap();
        assert_eq!(lock.holder, "run-a");

        storage.release_run_lock("acme", "run-a").unwrap();
        assert!(storage.current_lock("acme").unwrap().is_none());
        assert!(storage.try_acquire_run_lock("acme", "run-b", now).unwrap());
    }

    #[test]
    fn test_release_by_other_holder_keeps_lock() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let now = at(1_740_000_000);
        storage.try_acquire_run_lock("acme", "run-a", now).unwrap();

        storage.release_run_lock("acme", "run-b").unwrap();
        assert_eq!(storage.current_lock("acme").unwrap().unwrap().holder, "run-a");
    }

    #[test]
    fn test_stale_run_lock_is_reclaimed() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let start = at(1_740_000_000);
        storage.try_acquire_run_lock("acme", "crashed", start).unwrap();

        let almost = start + chrono::TimeDelta::minutes(119);
        assert!(!storage.try_acquire_run_lock("acme", "run-b", almost).unwrap());

        let later = start + chrono::TimeDelta::hours(2);
        assert!(storage.try_acquire_run_lock("acme", "run-b", later).unwrap());
        assert_eq!(storage.current_lock("acme").unwrap().unwrap().holder, "run-b");
    }

    #[test]
    fn test_record_run_and_last_run() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        assert!(storage.last_run("acme").unwrap().is_none());

        let report = SyncReport {
            fetched: 3,
            processed: 2,
            created: 1,
            unchanged: 1,
            errors: 1,
            ..SyncReport::default()
        };
        let finished = DateTime::from_timestamp(1_740_823_200, 0).unwrap();
        storage.record_run("acme", &report, finished).unwrap();

        let last = storage.last_run("acme").unwrap().unwrap();
        assert_eq!(last.report, report);
        assert_eq!(last.org_id, "acme");
        assert_eq!(last.finished_at, finished);
        assert!(storage.last_run("other").unwrap().is_none());
    }
}
