//! Command-line interface for mongo-console
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and CLI overrides
//! - Logging initialization
//! - Resolving the initial database and the commands to run

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use crate::config::{Config, LogLevel, OutputFormat};
use crate::error::Result;

/// Extract database name from MongoDB connection URI
///
/// Format: mongodb://[username:password@]host[:port][/database][?options]
fn extract_database_from_uri(uri: &str) -> Option<String> {
    let after_scheme = uri.split("://").nth(1)?;
    let path_part = after_scheme.split('/').nth(1)?;
    let db_name = path_part.split('?').next().unwrap_or("");

    (!db_name.is_empty()).then(|| db_name.to_string())
}

/// Execute shell-style commands against a MongoDB deployment
#[derive(Parser, Debug)]
#[command(
    name = "mongo-console",
    version,
    about = "Shell command interpreter for MongoDB administration",
    long_about = "Executes mongosh-style commands such as `show dbs`, `use shop` and
`db.products.find({price: {$gt: 100}}).sort({price: -1}).limit(5)`
and prints JSON results. Commands come from -e arguments or from stdin,
one per line."
)]
pub struct CliArgs {
    /// MongoDB connection URI
    ///
    /// Format: mongodb://[username:password@]host[:port][/database][?options]
    #[arg(value_name = "URI")]
    pub uri: Option<String>,

    /// Database selected at startup
    #[arg(long, value_name = "NAME")]
    pub database: Option<String>,

    /// Reject insert, update and delete operations
    #[arg(long = "read-only")]
    pub read_only: bool,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Command to execute (repeatable, executed in order)
    #[arg(short = 'e', long = "eval", value_name = "COMMAND")]
    pub execute: Vec<String>,

    /// Output format (json, json-pretty)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Disable colored output
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Use an empty in-process store instead of connecting
    #[arg(long = "in-memory")]
    pub in_memory: bool,

    /// Verbose mode (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Effective configuration (file, environment and arguments merged)
    config: Config,
}

impl CliInterface {
    /// Parse process arguments and load configuration
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Build from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let mut config = Config::load(args.config_file.as_deref())?;
        Self::apply_args_to_config(&mut config, &args)?;
        config.validate()?;

        Ok(Self { args, config })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the CLI arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Database selected at startup
    ///
    /// Priority:
    /// 1. --database argument
    /// 2. `console.default_database` (file or environment)
    /// 3. Database name from the connection URI
    pub fn initial_database(&self) -> Option<String> {
        self.args
            .database
            .clone()
            .or_else(|| self.config.console.default_database.clone())
            .or_else(|| extract_database_from_uri(&self.config.connection.uri))
    }

    /// Install the global tracing subscriber.
    ///
    /// Logs go to stderr; `RUST_LOG` directives refine the configured level.
    pub fn init_logging(&self) {
        let level = self.config.logging.level.to_tracing_level();
        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(level).into())
            .from_env_lossy();

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr);

        // A subscriber may already be installed (tests, embedding)
        let _ = if self.config.logging.timestamps {
            subscriber.try_init()
        } else {
            subscriber.without_time().try_init()
        };
    }

    /// Apply CLI arguments to configuration
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) -> Result<()> {
        if let Some(uri) = &args.uri {
            config.connection.uri = uri.clone();
        }

        if args.read_only {
            config.console.read_only = true;
        }

        if let Some(format) = &args.format {
            config.display.format = format.parse::<OutputFormat>()?;
        }

        if args.no_color {
            config.display.color_output = false;
        }

        if args.very_verbose {
            config.logging.level = LogLevel::Trace;
        } else if args.verbose {
            config.logging.level = LogLevel::Debug;
        }

        Ok(())
    }
}
