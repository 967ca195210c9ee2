//! evsync CLI entry point.

use clap::Parser;
use evsync::cli::commands::{self, sync::Locations};
use evsync::cli::{Cli, Commands};
use evsync::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet, matches!(cli.command, Commands::Watch { .. }));

    // Resolve effective JSON mode: --json OR non-TTY stdout
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

/// Long-running `watch` keeps timestamps; one-shot commands drop them.
fn init_tracing(verbose: u8, quiet: bool, timestamps: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if timestamps {
        builder.init();
    } else {
        builder.without_time().init();
    }
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    let locations = Locations {
        db: cli.db.as_ref(),
        config: cli.config.as_ref(),
        assets: cli.assets.as_ref(),
        actor: cli.actor.as_deref(),
    };

    match &cli.command {
        Commands::Sync => commands::sync::execute(&locations, json),
        Commands::Watch {
            once_first,
            interval,
        } => commands::watch::execute(&locations, *once_first, *interval, json),
        Commands::Status {
            list,
            status,
            limit,
        } => commands::status::execute(&locations, *list, status.as_deref(), *limit, json),
        Commands::History { event_id, limit } => {
            commands::history::execute(&locations, event_id, *limit, json)
        }
        Commands::Config { command } => commands::config::execute(command, &locations, json),
        Commands::Version => commands::version::execute(json),
        Commands::Completions { shell } => commands::completions::execute(*shell),
    }
}
