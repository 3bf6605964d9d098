//! Configuration management for reqgraph.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default resolver WebSocket endpoint.
pub const DEFAULT_RESOLVER_URL: &str = "ws://localhost:41071";

/// Client configuration.
///
/// Missing keys in the config file take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Append JSONL logs to `~/.reqgraph/logs/reqgraph.jsonl`.
    pub log_to_file: bool,
    /// Resolver WebSocket URL.
    pub resolver_url: String,
    /// Fixed context identifier; generated per session when unset.
    pub context_id: Option<String>,
    /// Fixed version tag; asked from the resolver when unset.
    pub version_tag: Option<String>,
    /// Connection attempts before giving up.
    pub connect_attempts: u32,
    /// Delay after the first failed connection attempt.
    pub connect_retry_delay_ms: u64,
    /// Cap for the doubling connection retry delay.
    pub connect_retry_max_delay_ms: u64,
    /// Timeout for one resolver request.
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_to_file: false,
            resolver_url: DEFAULT_RESOLVER_URL.to_string(),
            context_id: None,
            version_tag: None,
            connect_attempts: 100,
            connect_retry_delay_ms: 10,
            connect_retry_max_delay_ms: 1000,
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file if present, then apply
    /// environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            debug!(path = %config_path.display(), "Loading config file");
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };
        config.load_from_env();

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_env(|name| std::env::var(name).ok());
    }

    /// Apply `REQGRAPH_*` overrides; empty values are ignored.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(log_level) = var("REQGRAPH_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Some(url) = var("REQGRAPH_RESOLVER_URL") {
            self.resolver_url = url;
        }
        if let Some(context_id) = var("REQGRAPH_CONTEXT_ID") {
            self.context_id = Some(context_id);
        }
        if let Some(version_tag) = var("REQGRAPH_VERSION_TAG") {
            self.version_tag = Some(version_tag);
        }
    }

    /// The resolver URL, which must use `ws` or `wss`.
    pub fn resolver_url(&self) -> CoreResult<Url> {
        let url = Url::parse(&self.resolver_url)?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(CoreError::Config(format!(
                "resolver_url must use ws or wss, not {other}"
            ))),
        }
    }

    pub fn connect_retry_delay(&self) -> Duration {
        Duration::from_millis(self.connect_retry_delay_ms)
    }

    pub fn connect_retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.connect_retry_max_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
