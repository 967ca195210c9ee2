//! Watch command implementation.
//!
//! Runs reconciliation on a fixed interval until Ctrl-C. Settings are
//! re-read before every run, so `evsync config set` takes effect on the next
//! tick. A run that is already underway when the signal arrives finishes
//! first.

use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{info, warn};

use super::sync::{print_report, Locations, SyncContext};
use crate::config::RunInterval;
use crate::error::{Error, Result};

/// Execute the watch command.
///
/// `interval` pins the schedule; without it the stored run interval is
/// followed, including changes made while watching.
///
/// # Errors
///
/// Returns an error for missing credentials at startup or a storage
/// failure; lock contention and unusable settings only skip the affected
/// tick.
pub fn execute(
    locations: &Locations<'_>,
    once_first: bool,
    interval: Option<RunInterval>,
    json: bool,
) -> Result<()> {
    let mut context = SyncContext::open(locations)?;
    let mut current = interval.unwrap_or(context.settings.run_interval);

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;

    runtime.block_on(async {
        let mut ticker = schedule(current, once_first);
        let mut shutdown = std::pin::pin!(tokio::signal::ctrl_c());
        info!(org = %context.config.org_id, interval = %current, "Watching for event changes");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let wanted = tick(&mut context, locations, json).await?;
                    if interval.is_none() && wanted != current {
                        info!(from = %current, to = %wanted, "Run interval changed");
                        current = wanted;
                        ticker = schedule(current, false);
                    }
                }
                signal = &mut shutdown => {
                    if let Err(e) = signal {
                        warn!(error = %e, "Failed to listen for Ctrl-C");
                    }
                    info!("Stopping watch");
                    break;
                }
            }
        }

        Ok::<(), Error>(())
    })
}

fn schedule(interval: RunInterval, immediately: bool) -> Interval {
    let period = interval.period();
    let start = if immediately {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// One scheduled pass: reload settings, then reconcile.
///
/// Returns the run interval the stored settings ask for.
async fn tick(context: &mut SyncContext, locations: &Locations<'_>, json: bool) -> Result<RunInterval> {
    match context.reload(locations) {
        Ok(()) => {}
        Err(e @ Error::Config(_)) => {
            warn!(error = %e, "Settings are unusable, skipping run");
            return Ok(context.settings.run_interval);
        }
        Err(e) => return Err(e),
    }

    match context.run().await {
        Ok(report) => print_report(&context.config.org_id, &report, json)?,
        Err(Error::SyncInProgress { org }) => {
            warn!(org = %org, "Previous run still holds the lock, skipping");
        }
        Err(e) => return Err(e),
    }

    Ok(context.settings.run_interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{save_settings, SyncSettings};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_org(server: &MockServer, org: &str) {
        Mock::given(method("GET"))
            .and(path("/events"))
            .and(header("X-Org", org))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"evt": []})))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_tick_follows_changed_settings() {
        let server = MockServer::start().await;
        mount_org(&server, "acme").await;
        mount_org(&server, "beta").await;

        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        let db_path = dir.path().join("evsync.db");
        let assets = dir.path().join("assets");
        let locations = Locations {
            db: Some(&db_path),
            config: Some(&config_path),
            assets: Some(&assets),
            actor: None,
        };

        let mut settings = SyncSettings {
            api_key: "key".to_string(),
            org: "acme".to_string(),
            api_base_url: server.uri(),
            ..SyncSettings::default()
        };
        save_settings(&config_path, &settings).unwrap();
        let mut context = SyncContext::open(&locations).unwrap();
        assert_eq!(tick(&mut context, &locations, true).await.unwrap(), RunInterval::Daily);

        settings.org = "beta".to_string();
        settings.run_interval = RunInterval::Hourly;
        save_settings(&config_path, &settings).unwrap();
        assert_eq!(tick(&mut context, &locations, true).await.unwrap(), RunInterval::Hourly);
        assert_eq!(context.config.org_id, "beta");

        // Cleared credentials skip the run without stopping the watcher.
        settings.api_key = String::new();
        save_settings(&config_path, &settings).unwrap();
        assert_eq!(tick(&mut context, &locations, true).await.unwrap(), RunInterval::Hourly);
        assert_eq!(context.config.org_id, "beta");
    }
}
