//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Sense Reader - MQTT telemetry reader for the Raspberry Pi Sense HAT
#[derive(Parser, Debug)]
#[command(
    name = "sense-reader",
    author,
    version,
    about = "Sense HAT MQTT telemetry reader",
    long_about = "Subscribes to the Sense HAT telemetry topics on an MQTT broker, decodes and \n\
                  normalizes every reading, and keeps a bounded per-stream history that is \n\
                  polled and printed at a fixed interval."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SENSE_READER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SENSE_READER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect, ingest and print the latest readings
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults when omitted
    #[arg(short, long, env = "SENSE_READER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override broker address (`host[:port]`)
    #[arg(long, env = "SENSE_READER_BROKER")]
    pub broker: Option<String>,

    /// Use the built-in synthetic publisher instead of a broker
    #[arg(long)]
    pub mock: bool,

    /// Override per-stream history length
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Override poll interval in milliseconds
    #[arg(long, env = "SENSE_READER_POLL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Stop after this many polls (0 = unlimited)
    #[arg(long, default_value = "0", env = "SENSE_READER_MAX_POLLS")]
    pub max_polls: u64,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "SENSE_READER_TIMEOUT")]
    pub timeout: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "SENSE_READER_METRICS_PORT")]
    pub metrics_port: u16,

    /// Print each poll as one JSON line instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "sense-reader.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; built-in defaults when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the payload fields of each stream
    #[arg(long)]
    pub fields: bool,

    /// Print the effective configuration (defaults filled in) as TOML, or JSON with `--json`
    #[arg(long)]
    pub dump: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
