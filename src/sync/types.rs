//! Reconciliation run results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to one event during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// New content item created and tracked.
    Created,
    /// Existing content item rewritten.
    Updated,
    /// Record refreshed, content item untouched.
    Unchanged,
}

impl std::fmt::Display for EventOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Counters for one reconciliation run.
///
/// `processed` counts events that reached a terminal outcome; `errors`
/// counts everything that was logged and skipped, including retirement
/// failures and a failed list fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Events returned by the list fetch.
    pub fetched: usize,
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub retired: usize,
    pub errors: usize,
}

impl SyncReport {
    /// Count a processed event.
    pub fn record(&mut self, outcome: EventOutcome) {
        self.processed += 1;
        match outcome {
            EventOutcome::Created => self.created += 1,
            EventOutcome::Updated => self.updated += 1,
            EventOutcome::Unchanged => self.unchanged += 1,
        }
    }

    /// Count a skipped event or failed step.
    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// Count a retired content item.
    pub fn record_retired(&mut self) {
        self.retired += 1;
    }

    /// Returns true if the run changed any content item.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.created + self.updated + self.retired > 0
    }
}

/// A persisted run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub org_id: String,
    #[serde(flatten)]
    pub report: SyncReport,
    pub finished_at: DateTime<Utc>,
}
