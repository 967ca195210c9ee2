//! Date parsing and display formatting.
//!
//! Upstream sends two representations of the start: a human-readable date
//! string used for listing order, and Unix-second instants used for the
//! rendered date line. Both are parsed here.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Date-time layouts without an offset, interpreted in the display offset.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %I:%M%p",
    "%m/%d/%Y %H:%M",
    "%B %d, %Y %I:%M %p",
    "%B %d, %Y %I:%M%p",
    "%b %d, %Y %I:%M %p",
    "%b %d, %Y %I:%M%p",
    "%a, %b %d, %Y %I:%M %p",
    "%A, %B %d, %Y %I:%M %p",
    "%d %B %Y %H:%M",
    "%d %b %Y %H:%M",
];

/// Date-only layouts, taken as midnight in the display offset.
const NAIVE_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%a, %b %d, %Y",
    "%A, %B %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Layout of the date line in rendered content, e.g. `March 1, 2025 10:00am`.
pub const CONTENT_FORMAT: &str = "%B %-d, %Y %-I:%M%P";

/// Layout of the date in excerpts, e.g. `March 1, 2025 10:00 am`.
pub const EXCERPT_FORMAT: &str = "%B %-d, %Y %-I:%M %P";

/// Parse a human-readable date string.
///
/// Accepts RFC 3339, RFC 2822 and a set of common layouts. Strings without
/// an explicit offset are read as local time in `offset`.
#[must_use]
pub fn parse_listed_date(raw: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S %z", "%Y-%m-%dT%H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let naive = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NAIVE_DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a Unix-seconds instant given as a JSON number or numeric string.
///
/// Zero and negative values count as absent.
#[must_use]
pub fn parse_unix(value: &Value) -> Option<DateTime<Utc>> {
    let secs = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64))?,
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))?
        }
        _ => return None,
    };

    if secs <= 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0)
}

/// Render an instant in the display offset.
#[must_use]
pub fn format_in(dt: DateTime<Utc>, offset: FixedOffset, layout: &str) -> String {
    dt.with_timezone(&offset).format(layout).to_string()
}
