//! Configuration commands.

use crate::output::{self, OutputFormat};
use anyhow::Result;
use reqgraph_config_and_utils::{Config, Paths};
use serde_json::json;
use tracing::info;

/// Print the effective configuration and where it is read from.
pub fn show(config: &Config, paths: &Paths, format: OutputFormat) -> Result<()> {
    let path = paths.config_file();
    match format {
        OutputFormat::Text => {
            output::print_heading(&format!("Config {}", path.display()));
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        OutputFormat::Json => output::print_value(
            &json!({"path": path.display().to_string(), "config": config}),
            format,
        ),
    }
    Ok(())
}

/// Write the effective configuration, command line overrides included, to
/// the config file.
pub fn save(config: &Config, paths: &Paths, format: OutputFormat) -> Result<()> {
    config.save(paths)?;
    let path = paths.config_file();
    info!(path = %path.display(), "Config saved");

    match format {
        OutputFormat::Text => println!("Saved {}", path.display()),
        OutputFormat::Json => {
            output::print_value(&json!({"path": path.display().to_string()}), format)
        }
    }
    Ok(())
}
