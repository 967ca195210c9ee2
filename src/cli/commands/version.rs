//! Version command implementation.

use crate::config::DEFAULT_API_BASE_URL;
use crate::error::Result;
use crate::storage::schema::CURRENT_SCHEMA_VERSION;
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput<'a> {
    version: &'a str,
    build: &'a str,
    schema_version: i32,
    default_api_base_url: &'a str,
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let output = VersionOutput {
        version: env!("CARGO_PKG_VERSION"),
        build: if cfg!(debug_assertions) { "dev" } else { "release" },
        schema_version: CURRENT_SCHEMA_VERSION,
        default_api_base_url: DEFAULT_API_BASE_URL,
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!(
            "evsync version {} ({}, schema v{})",
            output.version, output.build, output.schema_version
        );
    }
    Ok(())
}
