//! CLI argument definitions for reconpost-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// reconpost OSINT scan daemon.
///
/// Serves the scan API over HTTP and runs reconnaissance modules
/// against submitted targets.
#[derive(Parser, Debug)]
#[command(name = "reconpost-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to reconpost.toml configuration file.
    ///
    /// A missing file falls back to built-in defaults.
    #[arg(short, long, default_value = "reconpost.toml")]
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

    /// Override the API listen address (`host:port`).
    #[arg(long)]
    pub listen: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}
