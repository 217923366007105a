//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// awsjson - deliver JSON datasets to AWS batch APIs
#[derive(Parser, Debug)]
#[command(
    name = "awsjson",
    author,
    version,
    about = "Batch JSON records into SQS, SNS, Kinesis, Firehose, DynamoDB or S3",
    long_about = "Loads a JSON array of records, splits it into batches that respect the \n\
                  target service's limits, sends them concurrently and retries only the \n\
                  records that failed transiently."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "AWSJSON_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "AWSJSON_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dispatch a dataset to the configured target
    Dispatch(DispatchArgs),

    /// Validate configuration file without sending anything
    Validate(ValidateArgs),

    /// Describe a dataset and the services able to accept it
    Info(InfoArgs),
}

/// Arguments for the `dispatch` command
#[derive(Parser, Debug, Clone)]
pub struct DispatchArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "awsjson.toml", env = "AWSJSON_CONFIG")]
    pub config: PathBuf,

    /// Path to the dataset (JSON array of objects)
    #[arg(short, long, env = "AWSJSON_INPUT")]
    pub input: PathBuf,

    /// Override the target destination from configuration
    #[arg(long, env = "AWSJSON_DESTINATION")]
    pub destination: Option<String>,

    /// Override retry.max_attempts from configuration
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Override dispatch.concurrency_limit from configuration
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Print the batch plan and exit without sending
    #[arg(long)]
    pub dry_run: bool,

    /// Write the full dispatch report as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Prometheus exporter port (disabled when unset)
    #[arg(long, env = "AWSJSON_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "awsjson.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to the dataset
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
