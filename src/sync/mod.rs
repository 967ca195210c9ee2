//! Reconciliation engine.
//!
//! One run takes the upstream event list, brings every tracked content item
//! in line with it, and retires items whose event has ended:
//!
//! 1. Validate configuration and take the per-organization run lock
//! 2. Fetch the event list and order it by listed start date
//! 3. Fetch details (bounded concurrency, applied in list order), normalize,
//!    then create, update or refresh each tracked record
//! 4. Retire every active record whose event ended before `now`
//! 5. Persist the run summary and release the lock
//!
//! Per-event failures are logged and counted; only configuration errors,
//! lock contention and state store failures abort a run.
//!
//! # Example
//!
//! ```ignore
//! let mut engine = SyncEngine::new(&source, &mut storage, &mut content, &images);
//! let report = engine.run_sync(&config).await?;
//! println!("{} created, {} retired", report.created, report.retired);
//! ```

mod hash;
mod types;

pub use hash::{content_hash, has_changed};
pub use types::{EventOutcome, RunSummary, SyncReport};

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset, Utc};
use futures_util::StreamExt;
use tracing::{debug, info, warn};

use crate::config::SyncConfiguration;
use crate::content::{ContentDraft, ContentSink, ImageStore};
use crate::error::{Error, Result};
use crate::model::{keys, RawEvent, TrackedRecord};
use crate::normalize::{listed_start, EventNormalizer};
use crate::source::EventSource;
use crate::storage::StateStore;

/// Drives reconciliation runs against one set of collaborators.
pub struct SyncEngine<'a, S, T, C, I> {
    source: &'a S,
    store: &'a mut T,
    sink: &'a mut C,
    images: &'a I,
    holder: String,
}

impl<'a, S, T, C, I> SyncEngine<'a, S, T, C, I>
where
    S: EventSource,
    T: StateStore,
    C: ContentSink,
    I: ImageStore,
{
    /// Create an engine. The run lock holder id is unique per engine.
    pub fn new(source: &'a S, store: &'a mut T, sink: &'a mut C, images: &'a I) -> Self {
        Self {
            source,
            store,
            sink,
            images,
            holder: format!("run_{}", &uuid::Uuid::new_v4().to_string()[..12]),
        }
    }

    /// Run one reconciliation pass now.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for missing credentials, `Error::SyncInProgress`
    /// if another run holds the lock, or a storage error that aborted the run.
    pub async fn run_sync(&mut self, config: &SyncConfiguration) -> Result<SyncReport> {
        self.run_sync_at(config, Utc::now()).await
    }

    /// Run one reconciliation pass with an explicit clock.
    ///
    /// `now` is the retirement cutoff and the timestamp written to records.
    ///
    /// # Errors
    ///
    /// Same as [`Self::run_sync`].
    pub async fn run_sync_at(
        &mut self,
        config: &SyncConfiguration,
        now: DateTime<Utc>,
    ) -> Result<SyncReport> {
        config.validate()?;

        let org = config.org_id.as_str();
        if !self.store.try_acquire_run_lock(org, &self.holder, now)? {
            return Err(Error::SyncInProgress {
                org: org.to_string(),
            });
        }
        info!(org, holder = %self.holder, "Sync started");

        let result = self.reconcile(config, now).await;
        let released = self.store.release_run_lock(org, &self.holder);

        let report = result?;
        released?;
        Ok(report)
    }

    async fn reconcile(&mut self, config: &SyncConfiguration, now: DateTime<Utc>) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        match self.source.fetch_all(&config.api_key, &config.org_id).await {
            Err(e) => {
                warn!(org = %config.org_id, error = %e, "Failed to fetch events");
                report.record_error();
            }
            Ok(events) if events.is_empty() => {
                info!(org = %config.org_id, "No events returned");
            }
            Ok(events) => {
                report.fetched = events.len();
                self.process_batch(events, config, now, &mut report).await?;
            }
        }

        self.retire_ended(now, &mut report)?;
        self.store.record_run(&config.org_id, &report, now)?;

        info!(
            org = %config.org_id,
            fetched = report.fetched,
            processed = report.processed,
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            retired = report.retired,
            errors = report.errors,
            "Sync finished"
        );
        Ok(report)
    }

    async fn process_batch(
        &mut self,
        events: Vec<RawEvent>,
        config: &SyncConfiguration,
        now: DateTime<Utc>,
        report: &mut SyncReport,
    ) -> Result<()> {
        let normalizer = EventNormalizer::new(config);
        let source = self.source;
        let api_key = config.api_key.as_str();
        let org = config.org_id.as_str();

        let fetches = futures_util::stream::iter(sort_by_listed_start(events, config.display_offset))
            .map(|summary| async move {
                let details = match summary.text(keys::REGISTRATION_PATH) {
                    Some(event_ref) => source.fetch_details(api_key, org, &event_ref).await,
                    None => None,
                };
                (summary, details)
            })
            .buffered(config.fetch_concurrency.max(1));
        let mut fetches = std::pin::pin!(fetches);

        while let Some((summary, details)) = fetches.next().await {
            let event_id = summary.id().unwrap_or_default();
            match self
                .process_event(&summary, details, &normalizer, config, now)
                .await
            {
                Ok(outcome) => {
                    debug!(event_id = %event_id, %outcome, "Event processed");
                    report.record(outcome);
                }
                Err(e) if e.is_per_event() => {
                    warn!(event_id = %event_id, error = %e, "Skipping event");
                    report.record_error();
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    async fn process_event(
        &mut self,
        summary: &RawEvent,
        details: Option<RawEvent>,
        normalizer: &EventNormalizer,
        config: &SyncConfiguration,
        now: DateTime<Utc>,
    ) -> Result<EventOutcome> {
        let Some(details) = details else {
            return Err(Error::Transport("event details unavailable".to_string()));
        };

        let event = normalizer.normalize(summary, &details)?;
        let draft = ContentDraft::from_event(&event, config);
        let hash = content_hash(&draft)?;

        match self.store.get(&event.id)? {
            None => {
                let content_id = self.sink.create(&draft).map_err(sink_error)?;
                info!(event_id = %event.id, content_id = %content_id, title = %event.title, "Created content item");
                self.attach_image(&content_id, event.image_url.as_deref()).await;

                self.store
                    .upsert(&TrackedRecord::new(content_id, event, hash, now))?;
                Ok(EventOutcome::Created)
            }
            Some(record)
                if config.update_existing_posts && has_changed(&hash, Some(&record.content_hash)) =>
            {
                self.sink
                    .update(&record.content_item_id, &draft)
                    .map_err(sink_error)?;
                info!(event_id = %event.id, content_id = %record.content_item_id, "Updated content item");
                self.attach_image(&record.content_item_id, event.image_url.as_deref())
                    .await;

                self.store.upsert(&TrackedRecord {
                    snapshot: event,
                    content_hash: hash,
                    last_updated: now,
                    ..record
                })?;
                Ok(EventOutcome::Updated)
            }
            Some(record) => {
                self.store.upsert(&TrackedRecord {
                    snapshot: event,
                    last_updated: now,
                    ..record
                })?;
                Ok(EventOutcome::Unchanged)
            }
        }
    }

    /// Store and attach the event image. Failures never fail the caller.
    async fn attach_image(&mut self, content_id: &str, image_url: Option<&str>) {
        let Some(url) = image_url else {
            return;
        };

        let attached = match self.images.store_image(url).await {
            Ok(asset) => self.sink.attach_image(content_id, &asset),
            Err(e) => Err(e),
        };
        if let Err(e) = attached {
            warn!(content_id, url, error = %e, "Failed to attach event image");
        }
    }

    fn retire_ended(&mut self, now: DateTime<Utc>, report: &mut SyncReport) -> Result<()> {
        for record in self.store.list_active_ended_before(now)? {
            match self.sink.retire(&record.content_item_id) {
                Ok(()) => {
                    self.store.mark_retired(&record.event_id, now)?;
                    info!(event_id = %record.event_id, content_id = %record.content_item_id, "Retired content item");
                    report.record_retired();
                }
                Err(e) => {
                    warn!(event_id = %record.event_id, error = %e, "Failed to retire content item");
                    report.record_error();
                }
            }
        }
        Ok(())
    }
}

/// Sink failures are per-event whatever their underlying cause.
fn sink_error(e: Error) -> Error {
    match e {
        Error::Sink(_) | Error::ContentNotFound { .. } => e,
        other => Error::Sink(other.to_string()),
    }
}

/// Stable sort by listed start; unparsable dates go last in fetch order.
fn sort_by_listed_start(events: Vec<RawEvent>, offset: FixedOffset) -> Vec<RawEvent> {
    let mut keyed: Vec<_> = events
        .into_iter()
        .map(|event| (listed_start(&event, offset), event))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    keyed.into_iter().map(|(_, event)| event).collect()
}
