//! Configuration, file system paths and logging setup for reqgraph.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{Config, DEFAULT_LOG_LEVEL, DEFAULT_RESOLVER_URL};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
