//! Event validation and normalization.
//!
//! Turns merged upstream payloads into typed [`Event`]s with rendered content
//! and excerpt. Normalization is pure: the same payload and configuration
//! always produce the same event, byte for byte.

pub mod date;
pub mod html;

use chrono::{DateTime, FixedOffset, Utc};

use crate::config::SyncConfiguration;
use crate::model::event::text_of;
use crate::model::{keys, Address, Event, RawEvent};

use date::{format_in, parse_listed_date, parse_unix, CONTENT_FORMAT, EXCERPT_FORMAT};
use html::{escape_html, strip_tags};

/// Why an upstream payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' is not a valid date: {value}")]
    InvalidDate { field: &'static str, value: String },
}

/// Check that a merged payload carries everything normalization needs.
///
/// # Errors
///
/// Returns the first problem found, checked in field order `eid`, `ttl`,
/// `str`, `sdp`, `edp`.
pub fn validate(raw: &RawEvent) -> Result<(), ValidationError> {
    RequiredFields::extract(raw, FixedOffset::east_opt(0).unwrap_or_else(|| unreachable!()))
        .map(|_| ())
}

/// Whether [`validate`] accepts the payload.
#[must_use]
pub fn is_valid(raw: &RawEvent) -> bool {
    validate(raw).is_ok()
}

/// Parse the listing date used to order a fetched batch.
#[must_use]
pub fn listed_start(raw: &RawEvent, offset: FixedOffset) -> Option<DateTime<Utc>> {
    raw.text(keys::LISTED_START)
        .and_then(|s| parse_listed_date(&s, offset))
}

/// Fields every event must carry, already parsed.
struct RequiredFields {
    id: String,
    title: String,
    listed_at: DateTime<Utc>,
    starts_at: DateTime<Utc>,
    ends_at: Option<DateTime<Utc>>,
}

impl RequiredFields {
    fn extract(raw: &RawEvent, offset: FixedOffset) -> Result<Self, ValidationError> {
        let id = raw.id().ok_or(ValidationError::MissingField(keys::ID))?;

        let title = raw
            .text(keys::TITLE)
            .map(|t| strip_tags(&t))
            .filter(|t| !t.is_empty())
            .ok_or(ValidationError::MissingField(keys::TITLE))?;

        let listed_raw = raw
            .text(keys::LISTED_START)
            .ok_or(ValidationError::MissingField(keys::LISTED_START))?;
        let listed_at = parse_listed_date(&listed_raw, offset).ok_or_else(|| {
            ValidationError::InvalidDate {
                field: keys::LISTED_START,
                value: listed_raw.clone(),
            }
        })?;

        let start_raw = raw
            .get(keys::START)
            .filter(|v| text_of(v).is_some())
            .ok_or(ValidationError::MissingField(keys::START))?;
        let starts_at = parse_unix(start_raw).ok_or_else(|| ValidationError::InvalidDate {
            field: keys::START,
            value: start_raw.to_string(),
        })?;

        let ends_at = match raw.get(keys::END).filter(|v| text_of(v).is_some()) {
            None => None,
            Some(end_raw) => Some(parse_unix(end_raw).ok_or_else(|| {
                ValidationError::InvalidDate {
                    field: keys::END,
                    value: end_raw.to_string(),
                }
            })?),
        };

        Ok(Self {
            id,
            title,
            listed_at,
            starts_at,
            ends_at,
        })
    }
}

/// Maps merged upstream payloads to [`Event`]s for one configuration.
#[derive(Debug, Clone)]
pub struct EventNormalizer {
    events_base_url: Option<String>,
    offset: FixedOffset,
}

impl EventNormalizer {
    #[must_use]
    pub fn new(config: &SyncConfiguration) -> Self {
        Self {
            events_base_url: config.events_base_url.clone(),
            offset: config.display_offset,
        }
    }

    /// Merge `details` over `summary` and build the normalized event.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the merged payload is incomplete or
    /// carries unparseable dates.
    pub fn normalize(&self, summary: &RawEvent, details: &RawEvent) -> Result<Event, ValidationError> {
        let merged = summary.merged_with(details);
        let required = RequiredFields::extract(&merged, self.offset)?;

        let location_text = merged.text(keys::LOCATION);
        let address = merged
            .object(keys::ADDRESS)
            .map(|adr| Address {
                street: adr.get(keys::STREET).and_then(text_of),
                city: adr.get(keys::CITY).and_then(text_of),
                region: adr.get(keys::REGION).and_then(text_of),
                postal: adr.get(keys::POSTAL).and_then(text_of),
            })
            .filter(|a| !a.is_empty());
        let description_html = merged
            .get(keys::DESCRIPTION)
            .and_then(serde_json::Value::as_str)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        let registration_path = merged.text(keys::REGISTRATION_PATH);
        let image_url = image_url(&merged);

        let mut event = Event {
            id: required.id,
            title: required.title,
            listed_at: required.listed_at,
            starts_at: required.starts_at,
            ends_at: required.ends_at,
            location_text,
            address,
            description_html,
            registration_path,
            image_url,
            excerpt: String::new(),
            content: String::new(),
        };
        event.excerpt = self.render_excerpt(&event);
        event.content = self.render_content(&event);

        Ok(event)
    }

    /// `[listed date] | [location]`, skipping whichever part is absent.
    fn render_excerpt(&self, event: &Event) -> String {
        let mut parts = vec![format_in(event.listed_at, self.offset, EXCERPT_FORMAT)];
        if let Some(loc) = &event.location_text {
            parts.push(escape_html(loc));
        }
        parts.join(" | ")
    }

    fn render_content(&self, event: &Event) -> String {
        let mut content = String::new();

        if let Some(url) = &event.image_url {
            content.push_str(&format!(
                r#"<div class="event-image"><img src="{}" alt="{}" class="event-thumbnail" /></div>"#,
                escape_html(url),
                escape_html(&event.title)
            ));
        }

        let start = format_in(event.starts_at, self.offset, CONTENT_FORMAT);
        match event.ends_at {
            Some(end) => content.push_str(&format!(
                "<p><strong>Date:</strong> {start} - {}</p>",
                format_in(end, self.offset, CONTENT_FORMAT)
            )),
            None => content.push_str(&format!("<p><strong>Date:</strong> {start}</p>")),
        }

        if let Some(address) = &event.address {
            content.push_str(&format!(
                "<p><strong>Location:</strong> {}</p>",
                escape_html(&address.one_line())
            ));
        }

        if let Some(description) = &event.description_html {
            content.push_str(&format!("<div class='event-description'>{description}</div>"));
        }

        if let (Some(base), Some(path)) = (&self.events_base_url, &event.registration_path) {
            content.push_str(&format!(
                r#"<p><a href="{}" class="button" target="_blank">Register for Event</a></p>"#,
                escape_html(&format!("{base}{path}"))
            ));
        }

        content
    }
}

/// Small logo preferred over large; only absolute http(s) URLs qualify.
fn image_url(raw: &RawEvent) -> Option<String> {
    let logo = raw.object(keys::LOGO)?;
    [keys::LOGO_SMALL, keys::LOGO_LARGE]
        .into_iter()
        .filter_map(|k| logo.get(k).and_then(text_of))
        .find(|url| {
            reqwest::Url::parse(url)
                .is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        })
}
