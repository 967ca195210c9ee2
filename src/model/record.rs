//! Tracked record model.
//!
//! One row per upstream event id, linking it to the content item created for
//! it. Rows are never deleted: a retired record stays as an audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Event;

/// Lifecycle of the content item behind a tracked record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    /// Content item is published.
    #[default]
    Active,
    /// Event ended; content item unpublished.
    Retired,
}

impl LifecycleStatus {
    /// Persisted column value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Retired => "deleted",
        }
    }
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Retired => write!(f, "retired"),
        }
    }
}

impl std::str::FromStr for LifecycleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "deleted" | "retired" => Ok(Self::Retired),
            _ => Err(format!("Unknown lifecycle status: {s}")),
        }
    }
}

/// Local bookkeeping for one upstream event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedRecord {
    /// Upstream event id (unique key).
    pub event_id: String,
    /// Id of the content item owned by the content sink.
    pub content_item_id: String,
    /// Last-seen normalized event.
    pub snapshot: Event,
    /// SHA256 of the content draft last written to the item.
    pub content_hash: String,
    pub status: LifecycleStatus,
    pub last_updated: DateTime<Utc>,
}

impl TrackedRecord {
    /// A fresh active record for a newly created content item.
    #[must_use]
    pub fn new(
        content_item_id: String,
        snapshot: Event,
        content_hash: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: snapshot.id.clone(),
            content_item_id,
            snapshot,
            content_hash,
            status: LifecycleStatus::Active,
            last_updated: now,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == LifecycleStatus::Active
    }
}
