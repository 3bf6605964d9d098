//! reqgraph CLI - build, inspect and submit request graphs.

mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use reqgraph_config_and_utils::{init_logging, Config, Paths};
use reqgraph_session::{AsyncId, ResultShape};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// reqgraph CLI - talk to a request resolver.
#[derive(Parser)]
#[command(name = "reqgraph")]
#[command(about = "Build, inspect and submit request graphs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Resolver WebSocket URL
    #[arg(long, global = true)]
    url: Option<String>,

    /// Context identifier attached to submitted requests
    #[arg(long, global = true)]
    context_id: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the resolver answers
    Ping,

    /// Show resolver build information
    Meta,

    /// Validate a graph file and print its canonical form and digest
    Show {
        /// JSON graph file
        file: PathBuf,
    },

    /// Submit a graph file to the resolver
    Submit {
        /// JSON graph file
        file: PathBuf,
        /// Expected result type
        #[arg(long, value_enum, default_value = "json")]
        result: ShapeArg,
        /// Ask the resolver to delegate evaluation to a remote worker
        #[arg(long)]
        remote: bool,
        /// Send the file unchanged instead of validating and re-encoding it
        #[arg(long)]
        raw: bool,
        /// Return the async request id instead of waiting for the result
        #[arg(long)]
        detach: bool,
    },

    /// Show the status of an async request
    Status {
        /// Async request id
        async_id: AsyncId,
    },

    /// Wait for an async request and print its result
    Result {
        /// Async request id
        async_id: AsyncId,
        /// Expected result type
        #[arg(long, value_enum, default_value = "json")]
        result: ShapeArg,
        /// Status polling interval in milliseconds
        #[arg(long, default_value_t = 200)]
        poll_ms: u64,
    },

    /// Cancel an async request
    Cancel {
        /// Async request id
        async_id: AsyncId,
    },

    /// Show or save the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Store a list of strings as a new object
    Post {
        /// Values of the stored array
        values: Vec<String>,
        /// Object type
        #[arg(long, default_value = "array/string")]
        schema: String,
    },

    /// Show the metadata of an object
    Metadata {
        /// Object id
        object_id: String,
    },

    /// Retrieve the content stored under an immutable id
    Retrieve {
        /// Immutable id
        immutable_id: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write the effective configuration, overrides included, to the config file
    Save,
}

/// Result type accepted by `submit` and `result`.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ShapeArg {
    String,
    Blob,
    Metadata,
    Json,
}

impl From<ShapeArg> for ResultShape {
    fn from(shape: ShapeArg) -> Self {
        match shape {
            ShapeArg::String => ResultShape::String,
            ShapeArg::Blob => ResultShape::Blob,
            ShapeArg::Metadata => ResultShape::Metadata,
            ShapeArg::Json => ResultShape::Json,
        }
    }
}

/// Load the config file and apply command line overrides.
fn load_config(cli: &Cli) -> anyhow::Result<(Config, Paths)> {
    let paths = Paths::new()?;
    let mut config = Config::load(&paths)?;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(url) = &cli.url {
        config.resolver_url = url.clone();
    }
    if let Some(context_id) = &cli.context_id {
        config.context_id = Some(context_id.clone());
    }
    Ok((config, paths))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let (config, paths) = load_config(&cli)?;
    let log_file = config.log_to_file.then(|| paths.log_file());
    init_logging(&config.log_level, log_file.as_deref())?;
    debug!(url = %config.resolver_url, "Configuration loaded");

    let format = cli.format;
    match cli.command {
        Commands::Ping => commands::ping(&config, format).await,
        Commands::Meta => commands::meta(&config, format).await,
        Commands::Show { file } => commands::show(&file, format),
        Commands::Submit {
            file,
            result,
            remote,
            raw,
            detach,
        } => commands::submit(&config, &file, result.into(), remote, raw, detach, format).await,
        Commands::Status { async_id } => commands::status(&config, async_id, format).await,
        Commands::Result {
            async_id,
            result,
            poll_ms,
        } => {
            let poll = Duration::from_millis(poll_ms.max(1));
            commands::result(&config, async_id, result.into(), poll, format).await
        }
        Commands::Cancel { async_id } => commands::cancel(&config, async_id, format).await,
        Commands::Config { command } => match command {
            ConfigCommands::Show => commands::config::show(&config, &paths, format),
            ConfigCommands::Save => commands::config::save(&config, &paths, format),
        },
        Commands::Post { values, schema } => {
            commands::post(&config, &schema, &values, format).await
        }
        Commands::Metadata { object_id } => commands::metadata(&config, &object_id, format).await,
        Commands::Retrieve { immutable_id } => {
            commands::retrieve(&config, &immutable_id, format).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e), format);
        std::process::exit(1);
    }
}
