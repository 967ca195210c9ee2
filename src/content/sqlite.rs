//! Local SQLite content store.
//!
//! Content items live in the same database file as the reconciliation state
//! but are reached through their own connection, so the engine can hold the
//! state store and the sink at the same time.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Transaction};
use serde::Serialize;

use super::{AssetRef, ContentDraft, ContentSink};
use crate::error::{Error, Result};
use crate::storage::audit::{get_events, AuditEvent, EventType};
use crate::storage::SqliteStorage;

const ENTITY_CONTENT: &str = "content_item";

/// Publication state of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Publish,
    Draft,
}

impl ContentStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Draft => "draft",
        }
    }
}

impl std::str::FromStr for ContentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "publish" => Ok(Self::Publish),
            "draft" => Ok(Self::Draft),
            _ => Err(format!("Unknown content status: {s}")),
        }
    }
}

/// A stored content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub author_id: String,
    pub status: ContentStatus,
    pub published_at: DateTime<Utc>,
    pub featured_asset_id: Option<String>,
    pub tags: Vec<String>,
}

/// [`ContentSink`] backed by the `content_items` tables.
#[derive(Debug)]
pub struct SqliteContentStore {
    storage: SqliteStorage,
}

impl SqliteContentStore {
    /// Open the content store in the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            storage: SqliteStorage::open(path)?,
        })
    }

    /// Open an in-memory content store (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        Ok(Self {
            storage: SqliteStorage::open_memory()?,
        })
    }

    /// Set the actor recorded on audit events.
    #[must_use]
    pub fn with_actor(self, actor: &str) -> Self {
        Self {
            storage: self.storage.with_actor(actor),
        }
    }

    /// Get an item by id, with its tags in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get(&self, id: &str) -> Result<Option<ContentItem>> {
        let conn = self.storage.conn();
        let row = conn
            .query_row(
                "SELECT id, title, content, excerpt, author_id, status, published_at, featured_asset_id
                 FROM content_items WHERE id = ?1",
                [id],
                map_item_row,
            )
            .optional()?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut stmt = conn
            .prepare("SELECT tag FROM content_tags WHERE content_item_id = ?1 ORDER BY position")?;
        let tags = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(Some(ContentItem {
            id: row.id,
            title: row.title,
            content: row.content,
            excerpt: row.excerpt,
            author_id: row.author_id,
            status: row.status.parse().map_err(Error::Other)?,
            published_at: DateTime::from_timestamp_millis(row.published_at).ok_or_else(|| {
                Error::Other(format!("Timestamp out of range: {}", row.published_at))
            })?,
            featured_asset_id: row.featured_asset_id,
            tags,
        }))
    }

    /// Count items by publication state.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count(&self, status: ContentStatus) -> Result<usize> {
        let n: i64 = self.storage.conn().query_row(
            "SELECT COUNT(*) FROM content_items WHERE status = ?1",
            [status.as_str()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// Audit history for one item, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn history(&self, id: &str, limit: Option<u32>) -> Result<Vec<AuditEvent>> {
        Ok(get_events(self.storage.conn(), ENTITY_CONTENT, id, limit)?)
    }

    fn set_fields(
        tx: &Transaction,
        id: &str,
        draft: &ContentDraft,
        now_ms: i64,
    ) -> Result<()> {
        let changed = tx.execute(
            "UPDATE content_items
             SET title = ?2, content = ?3, excerpt = ?4, author_id = ?5, published_at = ?6, updated_at = ?7
             WHERE id = ?1",
            rusqlite::params![
                id,
                draft.title,
                draft.content,
                draft.excerpt,
                draft.author_id,
                draft.published_at.timestamp_millis(),
                now_ms,
            ],
        )?;
        if changed == 0 {
            return Err(Error::ContentNotFound { id: id.to_string() });
        }
        Self::replace_tags(tx, id, &draft.tags)
    }

    fn replace_tags(tx: &Transaction, id: &str, tags: &[String]) -> Result<()> {
        tx.execute("DELETE FROM content_tags WHERE content_item_id = ?1", [id])?;
        for (position, tag) in tags.iter().enumerate() {
            tx.execute(
                "INSERT OR IGNORE INTO content_tags (content_item_id, tag, position) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, tag, i64::try_from(position).unwrap_or(i64::MAX)],
            )?;
        }
        Ok(())
    }
}

/// A `content_items` row before its status and timestamp are decoded.
struct ItemRow {
    id: String,
    title: String,
    content: String,
    excerpt: String,
    author_id: String,
    status: String,
    published_at: i64,
    featured_asset_id: Option<String>,
}

fn map_item_row(row: &rusqlite::Row) -> rusqlite::Result<ItemRow> {
    Ok(ItemRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        excerpt: row.get(3)?,
        author_id: row.get(4)?,
        status: row.get(5)?,
        published_at: row.get(6)?,
        featured_asset_id: row.get(7)?,
    })
}

impl ContentSink for SqliteContentStore {
    fn create(&mut self, draft: &ContentDraft) -> Result<String> {
        let id = format!("item_{}", &uuid::Uuid::new_v4().to_string()[..12]);
        let now = Utc::now().timestamp_millis();

        self.storage.mutate("create_content", |tx, ctx| {
            tx.execute(
                "INSERT INTO content_items (id, title, content, excerpt, author_id, status, published_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                rusqlite::params![
                    id,
                    draft.title,
                    draft.content,
                    draft.excerpt,
                    draft.author_id,
                    ContentStatus::Publish.as_str(),
                    draft.published_at.timestamp_millis(),
                    now,
                ],
            )?;
            Self::replace_tags(tx, &id, &draft.tags)?;

            ctx.record_change(ENTITY_CONTENT, &id, EventType::ContentCreated, None, Some(draft.title.clone()));
            Ok(())
        })?;

        Ok(id)
    }

    fn update(&mut self, id: &str, draft: &ContentDraft) -> Result<()> {
        let now = Utc::now().timestamp_millis();

        self.storage.mutate("update_content", |tx, ctx| {
            Self::set_fields(tx, id, draft, now)?;
            ctx.record_change(ENTITY_CONTENT, id, EventType::ContentUpdated, None, Some(draft.title.clone()));
            Ok(())
        })
    }

    fn retire(&mut self, id: &str) -> Result<()> {
        let now = Utc::now().timestamp_millis();

        self.storage.mutate("retire_content", |tx, ctx| {
            let changed = tx.execute(
                "UPDATE content_items SET status = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id, ContentStatus::Draft.as_str(), now],
            )?;
            if changed == 0 {
                return Err(Error::ContentNotFound { id: id.to_string() });
            }
            ctx.record_event(ENTITY_CONTENT, id, EventType::ContentRetired);
            Ok(())
        })
    }

    fn attach_image(&mut self, id: &str, asset: &AssetRef) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let file_path = asset.file_path.to_string_lossy().into_owned();

        self.storage.mutate("attach_image", |tx, ctx| {
            tx.execute(
                "INSERT OR IGNORE INTO assets (id, source_url, file_path, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![asset.id, asset.source_url, file_path, now],
            )?;

            let previous: Option<Option<String>> = tx
                .query_row(
                    "SELECT featured_asset_id FROM content_items WHERE id = ?1",
                    [id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(previous) = previous else {
                return Err(Error::ContentNotFound { id: id.to_string() });
            };

            tx.execute(
                "UPDATE content_items SET featured_asset_id = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id, asset.id, now],
            )?;
            ctx.record_change(ENTITY_CONTENT, id, EventType::ImageAttached, previous, Some(asset.id.clone()));
            Ok(())
        })
    }
}
