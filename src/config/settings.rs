//! Sync settings and the validated configuration passed to the engine.
//!
//! [`SyncSettings`] is the stored settings object, field-for-field what the
//! settings editor writes. [`SyncConfiguration`] is the parsed value handed
//! to every engine entry point; the engine never reads settings on its own.

use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Default upstream API root.
pub const DEFAULT_API_BASE_URL: &str = "https://api.membershipworks.com/v2";

/// Routing suffix every public events page URL is normalized to end with.
pub const EVENT_ROUTE_SUFFIX: &str = "/events/#!event/";

/// Default author for created content items.
pub const DEFAULT_AUTHOR_ID: &str = "evsync";

const DEFAULT_FETCH_CONCURRENCY: usize = 4;
const MAX_FETCH_CONCURRENCY: usize = 16;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// How often the scheduled sync runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunInterval {
    Hourly,
    Twicedaily,
    #[default]
    Daily,
}

impl RunInterval {
    /// Wall-clock period between scheduled runs.
    #[must_use]
    pub const fn period(&self) -> Duration {
        match self {
            Self::Hourly => Duration::from_secs(60 * 60),
            Self::Twicedaily => Duration::from_secs(12 * 60 * 60),
            Self::Daily => Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl std::fmt::Display for RunInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hourly => write!(f, "hourly"),
            Self::Twicedaily => write!(f, "twicedaily"),
            Self::Daily => write!(f, "daily"),
        }
    }
}

/// Stored settings object.
///
/// Unknown keys are ignored and missing keys take their defaults, so files
/// written by older versions keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub api_key: String,
    pub org: String,
    pub run_interval: RunInterval,
    /// Comma-separated default tags.
    pub post_tags: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub update_existing_posts: bool,
    /// Public events page; registration links are built from it.
    pub events_base_url: String,
    pub author_id: String,
    pub api_base_url: String,
    /// UTC offset used for human-readable dates, e.g. `+02:00`.
    pub display_offset: String,
    pub fetch_concurrency: usize,
    pub request_timeout_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            org: String::new(),
            run_interval: RunInterval::default(),
            post_tags: String::new(),
            update_existing_posts: true,
            events_base_url: String::new(),
            author_id: DEFAULT_AUTHOR_ID.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            display_offset: "+00:00".to_string(),
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl SyncSettings {
    /// Per-request timeout for outbound HTTP.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Accept `true`, `"1"`, `"yes"`, `1` and friends; settings editors are not
/// consistent about boolean encoding.
fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        serde_json::Value::String(s) => {
            matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
        }
        _ => false,
    })
}

/// Validated configuration for one sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfiguration {
    pub api_key: String,
    pub org_id: String,
    pub update_existing_posts: bool,
    /// Ordered, de-duplicated default tags.
    pub default_tags: Vec<String>,
    /// Canonical public events page, or `None` when unset or malformed.
    pub events_base_url: Option<String>,
    /// Author recorded on created content items.
    pub author_id: String,
    pub display_offset: FixedOffset,
    pub fetch_concurrency: usize,
    pub request_timeout: Duration,
}

impl SyncConfiguration {
    /// Configuration with defaults for everything but credentials.
    #[must_use]
    pub fn new(api_key: &str, org_id: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            org_id: org_id.to_string(),
            update_existing_posts: true,
            default_tags: Vec::new(),
            events_base_url: None,
            author_id: DEFAULT_AUTHOR_ID.to_string(),
            display_offset: utc(),
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Parse stored settings.
    ///
    /// Credentials are not checked here; [`Self::validate`] does that at the
    /// start of every run.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the display offset cannot be parsed.
    pub fn from_settings(settings: &SyncSettings) -> Result<Self> {
        let display_offset = parse_offset(&settings.display_offset).ok_or_else(|| {
            Error::Config(format!(
                "display_offset must look like +02:00, got '{}'",
                settings.display_offset
            ))
        })?;

        let events_base_url = canonical_events_base_url(&settings.events_base_url);
        if events_base_url.is_none() && !settings.events_base_url.trim().is_empty() {
            warn!(
                url = %settings.events_base_url,
                "Invalid events base URL, registration links disabled"
            );
        }

        let author_id = if settings.author_id.trim().is_empty() {
            DEFAULT_AUTHOR_ID.to_string()
        } else {
            settings.author_id.trim().to_string()
        };

        Ok(Self {
            api_key: settings.api_key.trim().to_string(),
            org_id: settings.org.trim().to_string(),
            update_existing_posts: settings.update_existing_posts,
            default_tags: parse_tags(&settings.post_tags),
            events_base_url,
            author_id,
            display_offset,
            fetch_concurrency: settings.fetch_concurrency.clamp(1, MAX_FETCH_CONCURRENCY),
            request_timeout: settings.request_timeout(),
        })
    }

    /// Builder-style setter for the events page.
    #[must_use]
    pub fn with_events_base_url(mut self, url: &str) -> Self {
        self.events_base_url = canonical_events_base_url(url);
        self
    }

    /// Builder-style setter for the default tags.
    #[must_use]
    pub fn with_tags(mut self, tags: &str) -> Self {
        self.default_tags = parse_tags(tags);
        self
    }

    /// Check run-level requirements.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the API key or organization is empty.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Config("api_key is not set".to_string()));
        }
        if self.org_id.trim().is_empty() {
            return Err(Error::Config("org is not set".to_string()));
        }
        Ok(())
    }
}

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap_or_else(|| unreachable!("zero offset is always valid"))
}

/// Split a comma-separated tag list, trimming and dropping empties and
/// repeats while keeping first-seen order.
#[must_use]
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Canonicalize the public events page URL.
///
/// Returns `None` for an empty value or anything that is not an absolute
/// http(s) URL. Otherwise the result always ends with [`EVENT_ROUTE_SUFFIX`].
#[must_use]
pub fn canonical_events_base_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let parsed = reqwest::Url::parse(raw).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }

    if raw.ends_with(EVENT_ROUTE_SUFFIX) {
        Some(raw.to_string())
    } else if raw.ends_with(EVENT_ROUTE_SUFFIX.trim_end_matches('/')) {
        Some(format!("{raw}/"))
    } else {
        Some(format!("{}{EVENT_ROUTE_SUFFIX}", raw.trim_end_matches('/')))
    }
}

/// Parse `+HH:MM`, `-HH:MM`, `+HH`, `Z` or `UTC`.
#[must_use]
pub fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Some(utc());
    }

    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None => (rest.parse::<i32>().ok()?, 0),
    };
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
