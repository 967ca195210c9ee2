//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::RunInterval;

pub mod commands;

/// evsync - Mirror upstream event listings into a local content store
#[derive(Parser, Debug)]
#[command(name = "evsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.evsync/data/evsync.db)
    #[arg(long, global = true, env = "EVSYNC_DB")]
    pub db: Option<PathBuf>,

    /// Settings file (default: ~/.evsync/config.json)
    #[arg(long, global = true, env = "EVSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for downloaded event images (default: ~/.evsync/assets)
    #[arg(long, global = true, env = "EVSYNC_ASSETS")]
    pub assets: Option<PathBuf>,

    /// Actor name for audit trail
    #[arg(long, global = true, env = "EVSYNC_ACTOR")]
    pub actor: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one reconciliation pass
    Sync,

    /// Run reconciliation on the configured interval until interrupted
    Watch {
        /// Run once immediately instead of waiting a full interval
        #[arg(long)]
        once_first: bool,

        /// Override the configured run interval
        #[arg(long, value_enum)]
        interval: Option<RunInterval>,
    },

    /// Show tracked event counts, the run lock and the last run
    Status {
        /// List tracked events
        #[arg(long)]
        list: bool,

        /// Only list events with this status (active, deleted)
        #[arg(long, requires = "list")]
        status: Option<String>,

        /// Maximum events to list
        #[arg(long, default_value = "50")]
        limit: u32,
    },

    /// Show the audit trail of one tracked event
    History {
        /// Upstream event id
        event_id: String,

        /// Maximum entries to show
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// View or edit stored settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show stored settings (API key masked)
    Show,

    /// Update one or more settings
    Set(ConfigSetArgs),

    /// Restore default settings
    Reset {
        /// Keep the stored API key and organization
        #[arg(long)]
        keep_credentials: bool,
    },
}

#[derive(Args, Debug, Default)]
pub struct ConfigSetArgs {
    /// Upstream API key
    #[arg(long)]
    pub api_key: Option<String>,

    /// Upstream organization id
    #[arg(long)]
    pub org: Option<String>,

    /// Scheduled run interval
    #[arg(long, value_enum)]
    pub run_interval: Option<RunInterval>,

    /// Comma-separated default tags
    #[arg(long)]
    pub post_tags: Option<String>,

    /// Rewrite existing content items when their event changes
    #[arg(long)]
    pub update_existing_posts: Option<bool>,

    /// Public events page used for registration links
    #[arg(long)]
    pub events_base_url: Option<String>,

    /// Author recorded on created content items
    #[arg(long)]
    pub author_id: Option<String>,

    /// Upstream API root
    #[arg(long)]
    pub api_base_url: Option<String>,

    /// UTC offset for displayed dates, e.g. +02:00
    #[arg(long, allow_hyphen_values = true)]
    pub display_offset: Option<String>,

    /// Concurrent detail requests per run
    #[arg(long)]
    pub fetch_concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,
}

impl ConfigSetArgs {
    /// Whether no field was given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.api_key.is_none()
            && self.org.is_none()
            && self.run_interval.is_none()
            && self.post_tags.is_none()
            && self.update_existing_posts.is_none()
            && self.events_base_url.is_none()
            && self.author_id.is_none()
            && self.api_base_url.is_none()
            && self.display_offset.is_none()
            && self.fetch_concurrency.is_none()
            && self.request_timeout_secs.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_watch_with_interval() {
        let cli = Cli::try_parse_from(["evsync", "watch", "--once-first", "--interval", "hourly"]).unwrap();
        match cli.command {
            Commands::Watch { once_first, interval } => {
                assert!(once_first);
                assert_eq!(interval, Some(RunInterval::Hourly));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_config_set_negative_offset() {
        let cli = Cli::try_parse_from([
            "evsync",
            "config",
            "set",
            "--display-offset",
            "-05:00",
            "--update-existing-posts",
            "false",
        ])
        .unwrap();
        let Commands::Config {
            command: ConfigCommands::Set(args),
        } = cli.command
        else {
            panic!("expected config set");
        };
        assert_eq!(args.display_offset.as_deref(), Some("-05:00"));
        assert_eq!(args.update_existing_posts, Some(false));
        assert!(!args.is_empty());
    }

    #[test]
    fn test_status_filter_requires_list() {
        assert!(Cli::try_parse_from(["evsync", "status", "--status", "active"]).is_err());
        assert!(Cli::try_parse_from(["evsync", "status", "--list", "--status", "active"]).is_ok());
    }
}
