//! Config command implementations.
//!
//! Reads and writes the stored settings object. Every write replaces the
//! whole file.

use crate::cli::{ConfigCommands, ConfigSetArgs};
use crate::config::{
    canonical_events_base_url, load_settings, mask_secret, parse_offset, save_settings,
    SyncSettings,
};
use crate::error::{Error, Result};

use super::sync::Locations;

/// Execute config commands.
///
/// # Errors
///
/// Returns an error if the settings file cannot be read or written, or a
/// value does not validate.
pub fn execute(command: &ConfigCommands, locations: &Locations<'_>, json: bool) -> Result<()> {
    match command {
        ConfigCommands::Show => show(locations, json),
        ConfigCommands::Set(args) => set(args, locations, json),
        ConfigCommands::Reset { keep_credentials } => reset(*keep_credentials, locations, json),
    }
}

fn show(locations: &Locations<'_>, json: bool) -> Result<()> {
    let path = locations.config_path()?;
    let settings = masked(load_settings(&path)?);

    if json {
        let output = serde_json::json!({
            "path": path.display().to_string(),
            "settings": settings,
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("Settings: {}", path.display());
    println!();
    print_settings(&settings);
    Ok(())
}

fn set(args: &ConfigSetArgs, locations: &Locations<'_>, json: bool) -> Result<()> {
    if args.is_empty() {
        return Err(Error::InvalidArgument(
            "Nothing to set. Pass at least one option, e.g. --org <ORG>".to_string(),
        ));
    }

    let path = locations.config_path()?;
    let settings = apply(load_settings(&path)?, args)?;
    save_settings(&path, &settings)?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "path": path.display().to_string(),
            "settings": masked(settings),
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Saved settings to {}", path.display());
    }
    Ok(())
}

fn reset(keep_credentials: bool, locations: &Locations<'_>, json: bool) -> Result<()> {
    let path = locations.config_path()?;
    let mut settings = SyncSettings::default();
    if keep_credentials {
        let current = load_settings(&path)?;
        settings.api_key = current.api_key;
        settings.org = current.org;
    }
    save_settings(&path, &settings)?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "path": path.display().to_string(),
            "kept_credentials": keep_credentials,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Reset settings at {}", path.display());
    }
    Ok(())
}

/// Merge the given options into `settings`, validating each value.
fn apply(mut settings: SyncSettings, args: &ConfigSetArgs) -> Result<SyncSettings> {
    if let Some(ref key) = args.api_key {
        settings.api_key = key.trim().to_string();
    }
    if let Some(ref org) = args.org {
        settings.org = org.trim().to_string();
    }
    if let Some(interval) = args.run_interval {
        settings.run_interval = interval;
    }
    if let Some(ref tags) = args.post_tags {
        settings.post_tags = tags.clone();
    }
    if let Some(update) = args.update_existing_posts {
        settings.update_existing_posts = update;
    }
    if let Some(ref url) = args.events_base_url {
        if !url.trim().is_empty() && canonical_events_base_url(url).is_none() {
            return Err(Error::InvalidArgument(format!(
                "events_base_url must be an absolute http(s) URL, got '{url}'"
            )));
        }
        settings.events_base_url = url.trim().to_string();
    }
    if let Some(ref author) = args.author_id {
        settings.author_id = author.trim().to_string();
    }
    if let Some(ref base) = args.api_base_url {
        reqwest::Url::parse(base)
            .map_err(|e| Error::InvalidArgument(format!("Invalid api_base_url '{base}': {e}")))?;
        settings.api_base_url = base.trim_end_matches('/').to_string();
    }
    if let Some(ref offset) = args.display_offset {
        if parse_offset(offset).is_none() {
            return Err(Error::InvalidArgument(format!(
                "display_offset must look like +02:00, got '{offset}'"
            )));
        }
        settings.display_offset = offset.trim().to_string();
    }
    if let Some(n) = args.fetch_concurrency {
        if n == 0 {
            return Err(Error::InvalidArgument("fetch_concurrency must be at least 1".to_string()));
        }
        settings.fetch_concurrency = n;
    }
    if let Some(secs) = args.request_timeout_secs {
        if secs == 0 {
            return Err(Error::InvalidArgument("request_timeout_secs must be at least 1".to_string()));
        }
        settings.request_timeout_secs = secs;
    }
    Ok(settings)
}

fn masked(mut settings: SyncSettings) -> SyncSettings {
    settings.api_key = mask_secret(&settings.api_key);
    settings
}

fn print_settings(s: &SyncSettings) {
    let or_unset = |v: &str| if v.is_empty() { "(not set)".to_string() } else { v.to_string() };

    println!("  api_key:               {}", or_unset(&s.api_key));
    println!("  org:                   {}", or_unset(&s.org));
    println!("  run_interval:          {}", s.run_interval);
    println!("  post_tags:             {}", or_unset(&s.post_tags));
    println!("  update_existing_posts: {}", s.update_existing_posts);
    println!("  events_base_url:       {}", or_unset(&s.events_base_url));
    println!("  author_id:             {}", s.author_id);
    println!("  api_base_url:          {}", s.api_base_url);
    println!("  display_offset:        {}", s.display_offset);
    println!("  fetch_concurrency:     {}", s.fetch_concurrency);
    println!("  request_timeout_secs:  {}", s.request_timeout_secs);
}
