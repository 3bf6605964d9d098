//! File system paths for reqgraph.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths under the reqgraph base directory.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory (~/.reqgraph)
    base_dir: PathBuf,
}

impl Paths {
    /// Paths rooted at `~/.reqgraph`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".reqgraph"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Config file path (~/.reqgraph/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Logs directory (~/.reqgraph/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// JSONL log file (~/.reqgraph/logs/reqgraph.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("reqgraph.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
