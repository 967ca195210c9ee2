//! Content publishing.
//!
//! The engine renders a [`ContentDraft`] per event and hands it to a
//! [`ContentSink`]. Images go through an [`ImageStore`] first and are then
//! attached to the item as an [`AssetRef`].

mod image;
mod sqlite;

pub use image::{HttpImageStore, ImageStore, MAX_IMAGE_BYTES};
pub use sqlite::{ContentItem, ContentStatus, SqliteContentStore};

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SyncConfiguration;
use crate::error::Result;
use crate::model::Event;
use crate::normalize::html::slugify;

/// Everything written to a content item on create or update.
///
/// The content hash stored on a tracked record is computed over this value,
/// so any field that should trigger an update must live here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDraft {
    pub title: String,
    /// Rendered HTML body.
    pub content: String,
    pub excerpt: String,
    /// Full tag set; replaces whatever the item had.
    pub tags: Vec<String>,
    pub author_id: String,
    /// Event start, used as the publish date.
    pub published_at: DateTime<Utc>,
}

impl ContentDraft {
    /// Render the draft for a normalized event.
    ///
    /// Tags are the configured defaults followed by the title slug, with
    /// duplicates dropped.
    #[must_use]
    pub fn from_event(event: &Event, config: &SyncConfiguration) -> Self {
        let mut tags = config.default_tags.clone();
        let slug = slugify(&event.title);
        if !slug.is_empty() && !tags.contains(&slug) {
            tags.push(slug);
        }

        Self {
            title: event.title.clone(),
            content: event.content.clone(),
            excerpt: event.excerpt.clone(),
            tags,
            author_id: config.author_id.clone(),
            published_at: event.starts_at,
        }
    }
}

/// A stored image ready to be attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    /// SHA256 of the image bytes.
    pub id: String,
    pub source_url: String,
    pub file_path: PathBuf,
}

/// Destination for published event content.
///
/// Items are never deleted: retiring one moves it to an unpublished state.
pub trait ContentSink {
    /// Create a published item and return its id.
    fn create(&mut self, draft: &ContentDraft) -> Result<String>;

    /// Rewrite an item's fields and tags. Publication state is unchanged.
    fn update(&mut self, id: &str, draft: &ContentDraft) -> Result<()>;

    /// Unpublish an item.
    fn retire(&mut self, id: &str) -> Result<()>;

    /// Set the item's featured image, replacing any previous one.
    fn attach_image(&mut self, id: &str, asset: &AssetRef) -> Result<()>;
}
