//! Sync command implementation.
//!
//! Builds the production collaborators (HTTP event source, SQLite state and
//! content stores, HTTP image store) from stored settings and runs one
//! reconciliation pass.

use std::path::PathBuf;

use colored::Colorize;
use tracing::debug;

use crate::config::{
    apply_env_overrides, load_settings, resolve_assets_dir, resolve_config_path, resolve_db_path,
    SyncConfiguration, SyncSettings,
};
use crate::content::{HttpImageStore, SqliteContentStore};
use crate::error::{Error, Result};
use crate::source::HttpEventSource;
use crate::storage::SqliteStorage;
use crate::sync::{SyncEngine, SyncReport};

/// Paths and actor shared by the commands that touch the database.
#[derive(Debug, Clone, Copy, Default)]
pub struct Locations<'a> {
    pub db: Option<&'a PathBuf>,
    pub config: Option<&'a PathBuf>,
    pub assets: Option<&'a PathBuf>,
    pub actor: Option<&'a str>,
}

impl Locations<'_> {
    pub(crate) fn db_path(&self) -> Result<PathBuf> {
        resolve_db_path(self.db.map(PathBuf::as_path))
            .ok_or_else(|| Error::Config("Could not determine database path".to_string()))
    }

    pub(crate) fn config_path(&self) -> Result<PathBuf> {
        resolve_config_path(self.config.map(PathBuf::as_path))
            .ok_or_else(|| Error::Config("Could not determine settings path".to_string()))
    }

    fn assets_dir(&self) -> Result<PathBuf> {
        resolve_assets_dir(self.assets.map(PathBuf::as_path))
            .ok_or_else(|| Error::Config("Could not determine assets directory".to_string()))
    }

    /// Stored settings with environment overrides applied.
    pub(crate) fn settings(&self) -> Result<SyncSettings> {
        Ok(apply_env_overrides(load_settings(&self.config_path()?)?))
    }
}

/// Everything one reconciliation run needs.
pub(crate) struct SyncContext {
    pub(crate) settings: SyncSettings,
    pub(crate) config: SyncConfiguration,
    source: HttpEventSource,
    storage: SqliteStorage,
    content: SqliteContentStore,
    images: HttpImageStore,
}

impl SyncContext {
    /// Load settings and open every store.
    ///
    /// Credentials are checked before anything is created on disk.
    pub(crate) fn open(locations: &Locations<'_>) -> Result<Self> {
        let (settings, config) = load_configuration(locations)?;

        let db_path = locations.db_path()?;
        debug!(db = %db_path.display(), org = %config.org_id, "Opening stores");

        let actor = locations.actor.unwrap_or(crate::storage::sqlite::DEFAULT_ACTOR);
        let storage = SqliteStorage::open(&db_path)?.with_actor(actor);
        let content = SqliteContentStore::open(&db_path)?.with_actor(actor);

        let (source, images) = http_clients(locations, &settings, &config)?;
        Ok(Self {
            settings,
            config,
            source,
            storage,
            content,
            images,
        })
    }

    /// Re-read settings and rebuild the configuration and HTTP clients.
    ///
    /// The stores stay open. On error the context is left unchanged.
    pub(crate) fn reload(&mut self, locations: &Locations<'_>) -> Result<()> {
        let (settings, config) = load_configuration(locations)?;
        let (source, images) = http_clients(locations, &settings, &config)?;

        if settings != self.settings {
            debug!(org = %config.org_id, "Settings changed");
        }
        self.settings = settings;
        self.config = config;
        self.source = source;
        self.images = images;
        Ok(())
    }

    /// Run one reconciliation pass.
    pub(crate) async fn run(&mut self) -> Result<SyncReport> {
        SyncEngine::new(&self.source, &mut self.storage, &mut self.content, &self.images)
            .run_sync(&self.config)
            .await
    }
}

fn load_configuration(locations: &Locations<'_>) -> Result<(SyncSettings, SyncConfiguration)> {
    let settings = locations.settings()?;
    let config = SyncConfiguration::from_settings(&settings)?;
    config.validate()?;
    Ok((settings, config))
}

fn http_clients(
    locations: &Locations<'_>,
    settings: &SyncSettings,
    config: &SyncConfiguration,
) -> Result<(HttpEventSource, HttpImageStore)> {
    Ok((
        HttpEventSource::new(&settings.api_base_url, config.request_timeout)?,
        HttpImageStore::new(locations.assets_dir()?, config.request_timeout)?,
    ))
}

/// Execute the sync command.
///
/// Per-event failures are reported in the summary; the command still
/// succeeds.
///
/// # Errors
///
/// Returns an error for missing credentials, lock contention or storage
/// failures.
pub fn execute(locations: &Locations<'_>, json: bool) -> Result<()> {
    let mut context = SyncContext::open(locations)?;
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;

    let report = runtime.block_on(context.run())?;
    print_report(&context.config.org_id, &report, json)
}

/// Print a run report.
pub(crate) fn print_report(org: &str, report: &SyncReport, json: bool) -> Result<()> {
    if json {
        let output = serde_json::json!({
            "success": true,
            "org": org,
            "report": report,
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("Sync complete for: {}", org.bold());
    if !report.has_changes() && report.errors == 0 {
        println!("No changes.");
    }
    println!();
    println!("  Fetched:   {}", report.fetched);
    println!("  Processed: {}", report.processed);
    println!("  Created:   {}", report.created.to_string().green());
    println!("  Updated:   {}", report.updated.to_string().cyan());
    println!("  Unchanged: {}", report.unchanged);
    println!("  Retired:   {}", report.retired.to_string().yellow());
    if report.errors > 0 {
        println!("  Errors:    {}", report.errors.to_string().red());
        println!();
        println!("Re-run with -v to see per-event failures.");
    }

    Ok(())
}
