//! CLI argument definitions for codewarden-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// codewarden scan daemon.
///
/// Registers each project directory, runs its security scan through the
/// job queue, and writes a JSON report once every scan reaches a terminal
/// state (or a shutdown signal arrives).
#[derive(Parser, Debug)]
#[command(name = "codewarden-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to codewarden.toml configuration file.
    #[arg(short, long, default_value = "codewarden.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without running any scan.
    #[arg(long)]
    pub validate: bool,

    /// Write the JSON report to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Project directories to scan, in submission order.
    #[arg(value_name = "PROJECT_DIR")]
    pub projects: Vec<PathBuf>,
}
