// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::DEFAULT_CONFIG_FILE;

/// Command-line arguments for `stackguard`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stackguard",
    version,
    about = "Start a backend/frontend pair behind health checks and validate it.",
    long_about = None
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the config file (TOML).
    ///
    /// Default: `Stack.toml` in the current working directory.
    #[arg(long, global = true, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STACKGUARD_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Override `[backend].port`.
    #[arg(long, global = true, value_name = "PORT")]
    pub backend_port: Option<u16>,

    /// Override `[frontend].port`.
    #[arg(long, global = true, value_name = "PORT")]
    pub frontend_port: Option<u16>,

    /// Parse + validate the config and print the plan; start nothing.
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Bring the stack up and hold it until Ctrl-C or a service exits.
    RunStack,

    /// Bring the stack up, run the validation cases and scan the logs.
    RunValidation {
        /// Keep the stack running after a passing run (until Ctrl-C).
        #[arg(long)]
        keep_running: bool,
    },

    /// Scan the configured log files for failure patterns.
    ScanLogs,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
