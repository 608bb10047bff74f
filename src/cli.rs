//! CLI arguments and subcommands for herakles-proc-snapshot.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Parses a config-file log level, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name, true).ok()
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-proc-snapshot",
    about = "Point-in-time snapshot of the Linux process table",
    long_about = "Point-in-time snapshot of the Linux process table.\n\n\
                  Reads /proc/<pid>/stat for every process, adds owner, cgroup slice, \
                  OOM score adjustment and I/O scheduling class, filters by scope and \
                  prints one line per process ordered by pid.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Scope: all, global, system or user (unknown names mean user)
    #[arg(short = 's', long)]
    pub scope: Option<String>,

    /// Output format: json, raw, values or debug
    #[arg(short = 'f', long)]
    pub format: Option<String>,

    /// Worker threads (default: one per logical CPU)
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    /// Stop discovery after N processes
    #[arg(long)]
    pub max_processes: Option<usize>,

    /// procfs mount point
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Log level (default: config file, then info)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the descriptor of this process
    #[command(name = "self")]
    Calling,

    /// List the available scopes
    Scopes,
}
