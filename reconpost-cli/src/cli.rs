//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// reconpost -- OSINT reconnaissance scans from the command line.
///
/// Use `reconpost <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "reconpost", version, about, long_about = None)]
pub struct Cli {
    /// Path to the reconpost.toml configuration file.
    #[arg(short, long, global = true, default_value = "reconpost.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the registered recon modules.
    Modules(ModulesArgs),

    /// Run a scan in-process and print the finished job.
    Scan(ScanArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- modules ----

/// List registered modules.
#[derive(Args, Debug)]
pub struct ModulesArgs {
    /// Only show modules applicable to this target type (domain, ip, email, username).
    #[arg(long = "type")]
    pub target_type: Option<String>,
}

// ---- scan ----

/// Run a one-shot scan against a single target.
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Target to investigate (domain, URL, IP address, email, or username).
    pub target: String,

    /// Explicit target type; inferred from the target when omitted.
    #[arg(long = "type")]
    pub target_type: Option<String>,

    /// Module to run (repeatable); all applicable modules when omitted.
    #[arg(short, long = "module")]
    pub modules: Vec<String>,

    /// How often to poll the job for progress, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,
}

// ---- config ----

/// Manage reconpost configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, server, scan, modules, metrics).
        #[arg(long)]
        section: Option<String>,
    },
}
