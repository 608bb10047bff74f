//! herakles-proc-snapshot - version 0.1.0
//!
//! Prints a filtered, pid-ordered snapshot of the process table.
//! This is the main entry point that resolves configuration, sets up tracing
//! logging and runs a single scan.

mod cli;
mod config;

use anyhow::Context;
use clap::Parser;
use nix::unistd::geteuid;
use std::io::{self, BufWriter, Write};
use tracing::{debug, info, warn, Level};

use herakles_proc_snapshot::{Filter, ProcessDescriptor, ScanOptions, Scanner};

use cli::{Args, Commands, LogLevel};
use config::{render_config, resolve_config, validate_effective_config, Config};

/// Initializes tracing logging subsystem with configured log level.
/// CLI level wins over the config file; logs go to stderr so stdout stays
/// machine-readable.
fn setup_logging(config: &Config, args: &Args) {
    let level = args
        .log_level
        .clone()
        .or_else(|| config.log_level.as_deref().and_then(LogLevel::from_name))
        .unwrap_or(LogLevel::Info);

    let max_level = match level {
        LogLevel::Off => return,
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(max_level)
        .with_writer(io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Tracing subscriber already installed");
        return;
    }

    debug!("Logging initialized with level: {:?}", level);
}

fn print_descriptors<'a>(
    config: &Config,
    procs: impl IntoIterator<Item = &'a ProcessDescriptor>,
) -> anyhow::Result<()> {
    let formatter = config.formatter();
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for p in procs {
        let line = formatter
            .render(p)
            .with_context(|| format!("Failed to render process {}", p.pid()))?;
        writeln!(out, "{}", line)?;
    }
    out.flush()?;
    Ok(())
}

fn run_scan(config: &Config) -> anyhow::Result<()> {
    let filter = config.filter();
    info!("Scanning {}", filter);
    if !geteuid().is_root() {
        warn!("Not running as root: owner and cgroup of other users' processes may be missing");
    }

    let options = ScanOptions {
        workers: config.workers,
        max_processes: config.max_processes,
        ..ScanOptions::default()
    };
    let scanner = Scanner::new(config.proc_root()).options(options);
    let procs = scanner
        .scan(filter)
        .with_context(|| format!("Scan of {} failed", scanner.root().display()))?;

    print_descriptors(config, &procs)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = resolve_config(&args)?;
    validate_effective_config(&config).context("Configuration invalid")?;

    setup_logging(&config, &args);
    if let Some(path) = &config.source {
        info!("Loaded configuration from: {}", path.display());
    }

    if args.show_config {
        println!("{}", render_config(&config, &args.config_format)?);
        return Ok(());
    }

    match &args.command {
        Some(Commands::Calling) => {
            let me = ProcessDescriptor::calling_from(config.proc_root())
                .context("Cannot describe calling process")?;
            print_descriptors(&config, [&me])
        }
        Some(Commands::Scopes) => {
            for filter in Filter::ALL {
                println!("{:<8} {}", filter.scope(), filter.description());
            }
            Ok(())
        }
        None => run_scan(&config),
    }
}
