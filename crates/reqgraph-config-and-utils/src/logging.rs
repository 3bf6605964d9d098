//! Logging initialization.
//!
//! Thin wrapper over the observability crate so every reqgraph binary sets up
//! tracing the same way.

use crate::CoreResult;
use observability::LogConfig;
use std::path::Path;

/// Initialize logging for a reqgraph binary.
///
/// Logs go to stderr; when `log_file` is given they are also appended to it
/// as JSON lines. `RUST_LOG` overrides `level`.
///
/// ```ignore
/// init_logging("info", None)?;
/// tracing::info!("ready");
/// ```
pub fn init_logging(level: &str, log_file: Option<&Path>) -> CoreResult<()> {
    observability::init_with_config(LogConfig {
        service_name: "reqgraph".into(),
        default_level: level.into(),
        log_path: log_file.map(Path::to_path_buf),
        also_stderr: true,
    })?;
    Ok(())
}
