//! # Observability
//!
//! Logging setup shared by the reqgraph binaries.
//!
//! Libraries only use `tracing` macros. A binary calls [`init_with_config`]
//! once at startup to decide where the events go:
//!
//! - without a log file, compact human-readable lines on stderr
//! - with a log file, one JSON object per line appended to that file, plus
//!   the compact stderr output when `also_stderr` is set
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "reqgraph".into(),
//!     default_level: "debug".into(),
//!     log_path: Some("/tmp/reqgraph.jsonl".into()),
//!     also_stderr: true,
//! })?;
//! tracing::info!(url = %url, "connecting");
//! ```
//!
//! `RUST_LOG` takes precedence over `default_level`.

mod file_sink;
mod json_layer;

use std::io;
use std::path::PathBuf;
use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use file_sink::LogFileWriter;
pub use json_layer::{JsonLayer, LogEntry};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every JSON log line.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// JSONL log file. Logs go to stderr only when unset.
    pub log_path: Option<PathBuf>,

    /// Keep the stderr output when a log file is configured.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize logging to stderr at `info`.
pub fn init(service_name: &str) -> io::Result<()> {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    })
}

/// Initialize logging with custom configuration.
///
/// Fails only if the log file cannot be opened. A second call in the same
/// process leaves the first subscriber in place.
pub fn init_with_config(config: LogConfig) -> io::Result<()> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level))
    };

    let Some(log_path) = &config.log_path else {
        let _ = tracing_subscriber::registry()
            .with(stderr_layer(filter()))
            .try_init();
        return Ok(());
    };

    let writer = LogFileWriter::open(log_path)?;
    let json_layer = JsonLayer::new(config.service_name.clone(), writer);
    let stderr = config.also_stderr.then(|| stderr_layer(filter()));

    if tracing_subscriber::registry()
        .with(json_layer.with_filter(filter()))
        .with(stderr)
        .try_init()
        .is_ok()
    {
        tracing::info!(
            service = %config.service_name,
            log_path = %log_path.display(),
            "observability initialized"
        );
    }
    Ok(())
}

fn stderr_layer<S>(filter: EnvFilter) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_target(true)
        .compact()
        .with_writer(io::stderr)
        .with_filter(filter)
        .boxed()
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
