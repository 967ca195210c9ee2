//! Reconciliation state storage.
//!
//! The engine talks to [`StateStore`]; [`SqliteStorage`] implements it on
//! SQLite with:
//! - WAL mode for concurrent reads
//! - IMMEDIATE transactions for atomic writes
//! - Audit events for history
//!
//! # Submodules
//!
//! - [`audit`] - Audit log storage
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod audit;
pub mod schema;
pub mod sqlite;

pub use sqlite::{MutationContext, RecordCounts, RunLock, SqliteStorage, STALE_LOCK_AFTER_MS};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::TrackedRecord;
use crate::sync::SyncReport;

/// Durable mapping from upstream event id to tracked record.
///
/// Implementations must be safe to share between processes: the run lock is
/// what keeps a manual and a scheduled run from interleaving.
pub trait StateStore {
    /// Look up a record by upstream event id.
    fn get(&self, event_id: &str) -> Result<Option<TrackedRecord>>;

    /// Insert or replace the record keyed by its event id.
    fn upsert(&mut self, record: &TrackedRecord) -> Result<()>;

    /// Active records whose event ended strictly before `cutoff`.
    ///
    /// Records without an end time are never returned.
    fn list_active_ended_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<TrackedRecord>>;

    /// Flip a record to retired.
    fn mark_retired(&mut self, event_id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Take the per-organization run lock.
    ///
    /// Returns `false` without waiting when another live holder has it.
    fn try_acquire_run_lock(&mut self, org_id: &str, holder: &str, now: DateTime<Utc>) -> Result<bool>;

    /// Drop the run lock if `holder` still owns it.
    fn release_run_lock(&mut self, org_id: &str, holder: &str) -> Result<()>;

    /// Persist the summary of a run that finished at `finished_at`.
    fn record_run(&mut self, org_id: &str, report: &SyncReport, finished_at: DateTime<Utc>) -> Result<()>;
}
