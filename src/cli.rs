//! Command-line interface for pidvisor.
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::config::Runtime;

/// Command-line interface for pidvisor.
#[derive(Parser)]
#[command(name = "pidvisor", version, author)]
#[command(
    about = "Launch, check, and stop a single background service via its pidfile",
    long_about = None
)]
pub struct Cli {
    /// Directory holding `logs/` and `run/` (defaults to the current directory).
    #[arg(short = 'w', long, value_name = "DIR", global = true)]
    pub working_directory: Option<PathBuf>,

    /// Directory the service is installed in (defaults to the parent of the
    /// directory holding this executable).
    #[arg(short = 'i', long, value_name = "DIR", global = true)]
    pub install_directory: Option<PathBuf>,

    /// Log debug output.
    #[arg(short, long, global = true, conflicts_with = "silent")]
    pub verbose: bool,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    pub silent: bool,

    /// Override the logging verbosity for this invocation only (a level name or 0-5).
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<LevelFilter>,

    /// Override the runtime selected by the service manifest (java, command).
    #[arg(short, long, value_name = "RUNTIME", global = true)]
    pub runtime: Option<Runtime>,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Maximum log level implied by the verbosity flags, if any was given.
    ///
    /// `--silent` and `--verbose` win over `--log-level`; `None` defers to `RUST_LOG`.
    pub fn log_filter(&self) -> Option<LevelFilter> {
        if self.silent {
            Some(LevelFilter::WARN)
        } else if self.verbose {
            Some(LevelFilter::DEBUG)
        } else {
            self.log_level
        }
    }
}

/// Available commands for pidvisor.
#[derive(Subcommand)]
pub enum Commands {
    /// Launch the service and record its pid.
    Start {
        /// Arguments forwarded verbatim to the service command.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Stop the service named by the pidfile.
    Stop,

    /// Stop the service if it is running, then start it again.
    Restart {
        /// Arguments forwarded verbatim to the service command.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Report whether the pidfile names a live process.
    Status {
        /// Emit machine-readable JSON output.
        #[arg(long)]
        json: bool,
    },
}

/// Parses command-line arguments and returns a `Cli` struct.
pub fn parse_args() -> Cli {
    Cli::parse()
}
