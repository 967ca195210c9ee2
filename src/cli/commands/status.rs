//! Status command implementation.

use chrono::Utc;
use colored::Colorize;
use serde::Serialize;

use super::sync::Locations;
use crate::error::{Error, Result};
use crate::model::{LifecycleStatus, TrackedRecord};
use crate::storage::{RecordCounts, RunLock, SqliteStorage, STALE_LOCK_AFTER_MS};
use crate::sync::RunSummary;

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    db_path: String,
    org: Option<String>,
    records: CountsOutput,
    lock: Option<LockOutput>,
    last_run: Option<RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    events: Option<Vec<EventRow>>,
}

#[derive(Serialize)]
struct CountsOutput {
    active: usize,
    retired: usize,
    total: usize,
}

impl From<RecordCounts> for CountsOutput {
    fn from(counts: RecordCounts) -> Self {
        Self {
            active: counts.active,
            retired: counts.retired,
            total: counts.total(),
        }
    }
}

#[derive(Serialize)]
struct LockOutput {
    #[serde(flatten)]
    lock: RunLock,
    stale: bool,
}

#[derive(Serialize)]
struct EventRow {
    event_id: String,
    title: String,
    status: LifecycleStatus,
    content_item_id: String,
    ends_at: Option<i64>,
    last_updated: i64,
}

impl From<&TrackedRecord> for EventRow {
    fn from(record: &TrackedRecord) -> Self {
        Self {
            event_id: record.event_id.clone(),
            title: record.snapshot.title.clone(),
            status: record.status,
            content_item_id: record.content_item_id.clone(),
            ends_at: record.snapshot.ends_at.map(|t| t.timestamp()),
            last_updated: record.last_updated.timestamp_millis(),
        }
    }
}

/// Execute status command.
///
/// A database that does not exist yet reports empty counts rather than
/// being created.
///
/// # Errors
///
/// Returns an error if settings cannot be read, `status_filter` is not a
/// lifecycle status, or the database query fails.
pub fn execute(
    locations: &Locations<'_>,
    list: bool,
    status_filter: Option<&str>,
    limit: u32,
    json: bool,
) -> Result<()> {
    let status_filter = status_filter
        .map(|s| s.parse::<LifecycleStatus>().map_err(Error::InvalidArgument))
        .transpose()?;

    let settings = locations.settings()?;
    let org = Some(settings.org.trim().to_string()).filter(|o| !o.is_empty());
    let db_path = locations.db_path()?;

    let (counts, lock, last_run, records) = if db_path.exists() {
        let storage = SqliteStorage::open(&db_path)?;
        let (lock, last_run) = match org.as_deref() {
            Some(org) => (storage.current_lock(org)?, storage.last_run(org)?),
            None => (None, None),
        };
        let records = if list {
            Some(storage.list_records(status_filter, Some(limit))?)
        } else {
            None
        };
        (storage.count_records()?, lock, last_run, records)
    } else {
        (RecordCounts::default(), None, None, list.then(Vec::new))
    };

    let now_ms = Utc::now().timestamp_millis();
    let lock = lock.map(|lock| LockOutput {
        stale: now_ms - lock.acquired_at.timestamp_millis() >= STALE_LOCK_AFTER_MS,
        lock,
    });

    if json {
        let output = StatusOutput {
            db_path: db_path.display().to_string(),
            org,
            records: counts.into(),
            lock,
            last_run,
            events: records.map(|r| r.iter().map(EventRow::from).collect()),
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{}", "evsync Status".bold());
    println!("=============");
    println!();
    println!("Database: {}", db_path.display());
    match org.as_deref() {
        Some(org) => println!("Org:      {org}"),
        None => println!("Org:      {}", "(not configured)".yellow()),
    }
    println!();
    println!("Tracked Events: {}", counts.total());
    println!("  Active:  {}", counts.active);
    println!("  Retired: {}", counts.retired);
    println!();

    match lock {
        Some(LockOutput { lock, stale: true }) => println!(
            "Run Lock: held by {} since {} {}",
            lock.holder,
            lock.acquired_at.to_rfc3339(),
            "(stale)".yellow()
        ),
        Some(LockOutput { lock, stale: false }) => println!(
            "Run Lock: held by {} since {}",
            lock.holder,
            lock.acquired_at.to_rfc3339()
        ),
        None => println!("Run Lock: free"),
    }

    match last_run {
        Some(run) => {
            let r = run.report;
            println!("Last Run: {}", run.finished_at.to_rfc3339());
            println!(
                "  {} created, {} updated, {} unchanged, {} retired, {} errors",
                r.created, r.updated, r.unchanged, r.retired, r.errors
            );
        }
        None => println!("Last Run: never"),
    }

    if let Some(records) = records {
        println!();
        if records.is_empty() {
            println!("No tracked events.");
        }
        for record in &records {
            let status = if record.is_active() {
                record.status.as_str().green()
            } else {
                record.status.as_str().dimmed()
            };
            println!("  {:<16} {:<8} {}", record.event_id, status, record.snapshot.title);
        }
    }

    Ok(())
}
