//! Resolver status commands.

use super::connect;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use reqgraph_config_and_utils::Config;
use serde_json::json;

/// Check that the resolver answers.
pub async fn ping(config: &Config, format: OutputFormat) -> Result<()> {
    let session = connect(config).await?;
    let pong = session.ping().await?;
    session.close().await?;

    match format {
        OutputFormat::Text => {
            println!("Resolver at {} is up ({})", config.resolver_url, pong);
        }
        OutputFormat::Json => {
            output::print_value(
                &json!({"url": config.resolver_url, "pong": pong}),
                format,
            );
        }
    }
    Ok(())
}

/// Show resolver build information.
pub async fn meta(config: &Config, format: OutputFormat) -> Result<()> {
    let session = connect(config).await?;
    let info = session.query_meta_info().await?;
    session.close().await?;

    match format {
        OutputFormat::Text => {
            output::print_heading("Resolver");
            output::print_row("URL", &config.resolver_url);
            output::print_row("Git version", &info.git_version);
            for (key, value) in &info.extra {
                let text = value
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string());
                output::print_row(key, &text);
            }
        }
        OutputFormat::Json => {
            output::print_value(&serde_json::to_value(&info)?, format);
        }
    }
    Ok(())
}
