//! Database schema definitions.
//!
//! One SQLite file holds both the reconciliation state (`tracked_events`,
//! `sync_locks`, `sync_runs`) and the local content store (`content_items`,
//! `content_tags`, `assets`).

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the evsync database.
///
/// Timestamps are INTEGER Unix milliseconds, except `tracked_events.ends_at`
/// which mirrors the upstream Unix-seconds end instant.
pub const SCHEMA_SQL: &str = r#"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Reconciliation State
-- ====================

-- Tracked events: one row per upstream event id, never deleted
CREATE TABLE IF NOT EXISTS tracked_events (
    event_id TEXT PRIMARY KEY,
    content_item_id TEXT NOT NULL,
    event_data TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    ends_at INTEGER,
    post_status TEXT NOT NULL DEFAULT 'active'
        CHECK (post_status IN ('active', 'deleted')),
    last_updated INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tracked_events_status_end ON tracked_events(post_status, ends_at);
CREATE INDEX IF NOT EXISTS idx_tracked_events_content ON tracked_events(content_item_id);

-- Run locks: at most one live sync per organization
CREATE TABLE IF NOT EXISTS sync_locks (
    org_id TEXT PRIMARY KEY,
    holder TEXT NOT NULL,
    acquired_at INTEGER NOT NULL
);

-- Run summaries
CREATE TABLE IF NOT EXISTS sync_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    org_id TEXT NOT NULL,
    fetched INTEGER NOT NULL DEFAULT 0,
    processed INTEGER NOT NULL DEFAULT 0,
    created INTEGER NOT NULL DEFAULT 0,
    updated INTEGER NOT NULL DEFAULT 0,
    unchanged INTEGER NOT NULL DEFAULT 0,
    retired INTEGER NOT NULL DEFAULT 0,
    errors INTEGER NOT NULL DEFAULT 0,
    finished_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sync_runs_org ON sync_runs(org_id, finished_at DESC);

-- ====================
-- Content Store
-- ====================

-- Downloaded images, content-addressed
CREATE TABLE IF NOT EXISTS assets (
    id TEXT PRIMARY KEY,
    source_url TEXT NOT NULL,
    file_path TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

-- Content items: published event pages
CREATE TABLE IF NOT EXISTS content_items (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    excerpt TEXT NOT NULL,
    author_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'publish'
        CHECK (status IN ('publish', 'draft')),
    published_at INTEGER NOT NULL,
    featured_asset_id TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    FOREIGN KEY (featured_asset_id) REFERENCES assets(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_content_items_status ON content_items(status);

-- Content tags: ordered tag set per item
CREATE TABLE IF NOT EXISTS content_tags (
    content_item_id TEXT NOT NULL,
    tag TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (content_item_id, tag),
    FOREIGN KEY (content_item_id) REFERENCES content_items(id) ON DELETE CASCADE
);

-- ====================
-- Audit Log
-- ====================

CREATE TABLE IF NOT EXISTS audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    actor TEXT NOT NULL,
    old_value TEXT,
    new_value TEXT,
    comment TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_log_entity ON audit_log(entity_type, entity_id);
CREATE INDEX IF NOT EXISTS idx_audit_log_created ON audit_log(created_at DESC);
"#;

/// Apply the schema to the database.
///
/// Idempotent: every statement uses `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}
