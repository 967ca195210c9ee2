//! Event models.
//!
//! Upstream payloads arrive as loosely typed JSON objects. [`RawEvent`] keeps
//! them as-is so summary and detail responses can be merged key by key, and
//! the normalizer turns the merged object into a typed [`Event`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Upstream field names.
pub mod keys {
    pub const ID: &str = "eid";
    pub const TITLE: &str = "ttl";
    /// Human-readable start date, used for sorting and validation.
    pub const LISTED_START: &str = "str";
    /// Start instant (Unix seconds).
    pub const START: &str = "sdp";
    /// End instant (Unix seconds).
    pub const END: &str = "edp";
    pub const LOCATION: &str = "loc";
    pub const ADDRESS: &str = "adr";
    pub const STREET: &str = "ad1";
    pub const CITY: &str = "cit";
    pub const REGION: &str = "sta";
    pub const POSTAL: &str = "zip";
    pub const DESCRIPTION: &str = "dtl";
    pub const REGISTRATION_PATH: &str = "url";
    pub const LOGO: &str = "lgo";
    pub const LOGO_SMALL: &str = "s";
    pub const LOGO_LARGE: &str = "l";
}

/// An upstream event payload (summary list entry or detail response).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEvent(Map<String, Value>);

impl RawEvent {
    /// Wrap a JSON object.
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Convert a JSON value, returning `None` unless it is an object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Raw access to a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set a field, replacing any previous value.
    pub fn insert(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    /// A field as trimmed, non-empty text.
    ///
    /// Numbers are rendered as text so numeric ids still qualify.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<String> {
        text_of(self.0.get(key)?)
    }

    /// A nested object field.
    #[must_use]
    pub fn object(&self, key: &str) -> Option<&Map<String, Value>> {
        self.0.get(key).and_then(Value::as_object)
    }

    /// The upstream event id, if present.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.text(keys::ID)
    }

    /// Overlay `details` on top of this summary.
    ///
    /// Detail fields win on key collision; keys only present in the
    /// summary are kept.
    #[must_use]
    pub fn merged_with(&self, details: &Self) -> Self {
        let mut merged = self.0.clone();
        for (key, value) in &details.0 {
            merged.insert(key.clone(), value.clone());
        }
        Self(merged)
    }
}

impl From<Map<String, Value>> for RawEvent {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Render a scalar JSON value as trimmed, non-empty text.
pub(crate) fn text_of(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() { None } else { Some(text) }
}

/// Postal address of an event venue. Every part is optional upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal: Option<String>,
}

impl Address {
    /// True when no part of the address is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.street.is_none() && self.city.is_none() && self.region.is_none() && self.postal.is_none()
    }

    /// Single-line form: `street, city, region postal`, skipping absent parts.
    #[must_use]
    pub fn one_line(&self) -> String {
        let region_postal = [self.region.as_deref(), self.postal.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");

        [self.street.as_deref(), self.city.as_deref(), Some(region_postal.as_str())]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A validated, normalized event.
///
/// This is also the snapshot persisted with each tracked record, so it must
/// round-trip through JSON unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Stable upstream identifier.
    pub id: String,
    /// Title with markup stripped.
    pub title: String,
    /// Start as listed in the summary's human-readable date string.
    pub listed_at: DateTime<Utc>,
    /// Start instant.
    pub starts_at: DateTime<Utc>,
    /// End instant; events without one are never retired.
    pub ends_at: Option<DateTime<Utc>>,
    pub location_text: Option<String>,
    pub address: Option<Address>,
    /// Description markup, passed through untouched.
    pub description_html: Option<String>,
    /// Registration path relative to the public events page.
    pub registration_path: Option<String>,
    pub image_url: Option<String>,
    /// Short plain summary: date and location.
    pub excerpt: String,
    /// Rendered HTML body.
    pub content: String,
}

impl Event {
    /// Whether the event ended strictly before `cutoff`.
    #[must_use]
    pub fn ended_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.ends_at.is_some_and(|end| end < cutoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawEvent {
        RawEvent::from_value(value).unwrap()
    }

    #[test]
    fn test_from_value_requires_object() {
        assert!(RawEvent::from_value(json!([1, 2])).is_none());
        assert!(RawEvent::from_value(json!("evt")).is_none());
        assert!(RawEvent::from_value(json!({})).is_some());
    }

    #[test]
    fn test_text_trims_and_renders_numbers() {
        let event = raw(json!({"eid": 42, "ttl": "  Launch  ", "loc": "   ", "adr": {}}));
        assert_eq!(event.id(), Some("42".to_string()));
        assert_eq!(event.text("ttl"), Some("Launch".to_string()));
        assert_eq!(event.text("loc"), None);
        assert_eq!(event.text("adr"), None);
        assert_eq!(event.text("missing"), None);
    }

    #[test]
    fn test_merge_detail_wins() {
        let summary = raw(json!({"eid": "e1", "ttl": "Summary title", "url": "2025/3/1/launch"}));
        let details = raw(json!({"ttl": "Detail title", "dtl": "<p>Hi</p>"}));

        let merged = summary.merged_with(&details);
        assert_eq!(merged.text("ttl"), Some("Detail title".to_string()));
        assert_eq!(merged.text("url"), Some("2025/3/1/launch".to_string()));
        assert_eq!(merged.text("dtl"), Some("<p>Hi</p>".to_string()));
        assert_eq!(merged.id(), Some("e1".to_string()));
    }

    #[test]
    fn test_address_one_line_skips_absent_parts() {
        let full = Address {
            street: Some("123 Test St".into()),
            city: Some("Test City".into()),
            region: Some("TS".into()),
            postal: Some("12345".into()),
        };
        assert_eq!(full.one_line(), "123 Test St, Test City, TS 12345");

        let partial = Address {
            street: None,
            city: Some("Springfield".into()),
            region: None,
            postal: Some("99999".into()),
        };
        assert_eq!(partial.one_line(), "Springfield, 99999");
        assert!(Address::default().is_empty());
    }
}
