//! CLI command implementations.

pub mod config;
mod graph;
mod jobs;
mod objects;
mod resolver;

pub use graph::{show, submit};
pub use jobs::{cancel, result, status};
pub use objects::{metadata, post, retrieve};
pub use resolver::{meta, ping};

use anyhow::{Context, Result};
use reqgraph_config_and_utils::Config;
use reqgraph_session::{ConnectPolicy, Session, SessionConfig};

/// Session settings taken from the loaded configuration.
fn session_config(config: &Config) -> Result<SessionConfig> {
    let url = config.resolver_url()?;
    Ok(SessionConfig {
        url: url.to_string(),
        context_id: config.context_id.clone(),
        version_tag: config.version_tag.clone(),
        connect: ConnectPolicy {
            attempts: config.connect_attempts.max(1),
            retry_delay: config.connect_retry_delay(),
            max_delay: config.connect_retry_max_delay(),
        },
        request_timeout: config.request_timeout(),
    })
}

/// Open a session with the configured resolver.
async fn connect(config: &Config) -> Result<Session> {
    let session_config = session_config(config)?;
    Session::connect(session_config)
        .await
        .with_context(|| format!("Cannot reach resolver at {}", config.resolver_url))
}
