//! Configuration management.
//!
//! This module provides functions for resolving evsync directories, the
//! database path and the settings file, and for loading and saving the
//! stored settings object.
//!
//! # Layout
//!
//! - **Settings**: `~/.evsync/config.json`
//! - **Database**: `~/.evsync/data/evsync.db`
//! - **Assets**: `~/.evsync/assets/` (downloaded event images)

mod settings;

pub use settings::{
    canonical_events_base_url, parse_offset, parse_tags, RunInterval, SyncConfiguration,
    SyncSettings, DEFAULT_API_BASE_URL, DEFAULT_AUTHOR_ID, EVENT_ROUTE_SUFFIX,
};

use crate::error::{Error, Result};

use std::fs;
use std::path::{Path, PathBuf};

/// Get the global evsync directory (`~/.evsync/`).
#[must_use]
pub fn global_evsync_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".evsync"))
}

/// Read a non-empty environment variable.
fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `EVSYNC_DB` environment variable
/// 3. Global location: `~/.evsync/data/evsync.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Some(db_path) = env_non_empty("EVSYNC_DB") {
        return Some(PathBuf::from(db_path));
    }

    global_evsync_dir().map(|dir| dir.join("data").join("evsync.db"))
}

/// Resolve the settings file path.
///
/// Priority: explicit path, `EVSYNC_CONFIG`, `~/.evsync/config.json`.
#[must_use]
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Some(path) = env_non_empty("EVSYNC_CONFIG") {
        return Some(PathBuf::from(path));
    }

    global_evsync_dir().map(|dir| dir.join("config.json"))
}

/// Resolve the directory downloaded images are written to.
///
/// Priority: explicit path, `EVSYNC_ASSETS`, `~/.evsync/assets`.
#[must_use]
pub fn resolve_assets_dir(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Some(path) = env_non_empty("EVSYNC_ASSETS") {
        return Some(PathBuf::from(path));
    }

    global_evsync_dir().map(|dir| dir.join("assets"))
}

/// Load the stored settings object.
///
/// A missing file yields the defaults.
///
/// # Errors
///
/// Returns `Error::Config` if the file exists but cannot be read or parsed.
pub fn load_settings(path: &Path) -> Result<SyncSettings> {
    if !path.exists() {
        return Ok(SyncSettings::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
}

/// Save the settings object, replacing the whole file.
///
/// # Errors
///
/// Returns `Error::Config` if the directory or file cannot be written.
pub fn save_settings(path: &Path, settings: &SyncSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
    }

    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

    // Write to a sibling temp file first so a crash never leaves half a file.
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)
        .map_err(|e| Error::Config(format!("Failed to write config file: {e}")))?;
    fs::rename(&tmp, path)
        .map_err(|e| Error::Config(format!("Failed to write config file: {e}")))?;

    Ok(())
}

/// Apply environment overrides on top of stored settings.
///
/// `EVSYNC_API_KEY`, `EVSYNC_ORG` and `EVSYNC_API_BASE_URL` win over the file.
#[must_use]
pub fn apply_env_overrides(mut settings: SyncSettings) -> SyncSettings {
    if let Some(key) = env_non_empty("EVSYNC_API_KEY") {
        settings.api_key = key;
    }
    if let Some(org) = env_non_empty("EVSYNC_ORG") {
        settings.org = org;
    }
    if let Some(base) = env_non_empty("EVSYNC_API_BASE_URL") {
        settings.api_base_url = base;
    }
    settings
}

/// Mask a secret for display, keeping the last four characters.
#[must_use]
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.is_empty() {
        return String::new();
    }
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{visible}", "*".repeat(chars.len() - 4))
}
