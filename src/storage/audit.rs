//! Audit log storage and retrieval.
//!
//! Every lifecycle mutation (record upserts, retirements, content item
//! changes, lock traffic) leaves a row in `audit_log`.

use rusqlite::{Connection, Result};

/// Event types for audit logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    // Tracked record events
    RecordCreated,
    RecordUpdated,
    RecordRetired,

    // Content item events
    ContentCreated,
    ContentUpdated,
    ContentRetired,
    ImageAttached,

    // Run lock events
    LockAcquired,
    LockReleased,
    LockReclaimed,

    RunRecorded,
}

impl EventType {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RecordCreated => "record_created",
            Self::RecordUpdated => "record_updated",
            Self::RecordRetired => "record_retired",
            Self::ContentCreated => "content_created",
            Self::ContentUpdated => "content_updated",
            Self::ContentRetired => "content_retired",
            Self::ImageAttached => "image_attached",
            Self::LockAcquired => "lock_acquired",
            Self::LockReleased => "lock_released",
            Self::LockReclaimed => "lock_reclaimed",
            Self::RunRecorded => "run_recorded",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "record_created" => Self::RecordCreated,
            "record_updated" => Self::RecordUpdated,
            "record_retired" => Self::RecordRetired,
            "content_created" => Self::ContentCreated,
            "content_updated" => Self::ContentUpdated,
            "content_retired" => Self::ContentRetired,
            "image_attached" => Self::ImageAttached,
            "lock_acquired" => Self::LockAcquired,
            "lock_released" => Self::LockReleased,
            "lock_reclaimed" => Self::LockReclaimed,
            "run_recorded" => Self::RunRecorded,
            _ => return None,
        })
    }
}

/// An audit log row.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub event_type: EventType,
    pub actor: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub comment: Option<String>,
    pub created_at: i64,
}

impl AuditEvent {
    /// Create a new event (id will be assigned by database).
    #[must_use]
    pub fn new(entity_type: &str, entity_id: &str, event_type: EventType, actor: &str) -> Self {
        Self {
            id: 0,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            event_type,
            actor: actor.to_string(),
            old_value: None,
            new_value: None,
            comment: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Add old/new values for field change tracking.
    #[must_use]
    pub fn with_values(mut self, old: Option<String>, new: Option<String>) -> Self {
        self.old_value = old;
        self.new_value = new;
        self
    }

    /// Add a comment to the event.
    #[must_use]
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }
}

/// Insert an event into the audit log.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_event(conn: &Connection, event: &AuditEvent) -> Result<i64> {
    conn.execute(
        "INSERT INTO audit_log (entity_type, entity_id, event_type, actor, old_value, new_value, comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            event.entity_type,
            event.entity_id,
            event.event_type.as_str(),
            event.actor,
            event.old_value,
            event.new_value,
            event.comment,
            event.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get the most recent events for an entity, newest first.
///
/// Rows with an event type this build does not know are skipped.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_events(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
    limit: Option<u32>,
) -> Result<Vec<AuditEvent>> {
    let limit = limit.unwrap_or(100);
    let mut stmt = conn.prepare(
        "SELECT id, entity_type, entity_id, event_type, actor, old_value, new_value, comment, created_at
         FROM audit_log
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY created_at DESC, id DESC
         LIMIT ?3",
    )?;

    let rows = stmt.query_map(rusqlite::params![entity_type, entity_id, limit], |row| {
        let Some(event_type) = EventType::parse(&row.get::<_, String>(3)?) else {
            return Ok(None);
        };
        Ok(Some(AuditEvent {
            id: row.get(0)?,
            entity_type: row.get(1)?,
            entity_id: row.get(2)?,
            event_type,
            actor: row.get(4)?,
            old_value: row.get(5)?,
            new_value: row.get(6)?,
            comment: row.get(7)?,
            created_at: row.get(8)?,
        }))
    })?;

    rows.filter_map(std::result::Result::transpose).collect()
}
