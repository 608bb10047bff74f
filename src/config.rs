//! Configuration management for herakles-proc-snapshot.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use herakles_proc_snapshot::{Filter, Formatter, DEFAULT_PROC_ROOT};

use crate::cli::{Args, ConfigFormat};

/// Default config file locations, first match wins.
pub const DEFAULT_CONFIG_PATHS: [&str; 4] = [
    "/etc/herakles/proc-snapshot.yaml",
    "/etc/herakles/proc-snapshot.yml",
    "./herakles-proc-snapshot.yaml",
    "./herakles-proc-snapshot.yml",
];

/// Effective configuration. Unset fields fall back to built-in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// procfs mount point to scan
    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,

    /// all | global | system | user (unknown names mean "user")
    pub scope: Option<String>,

    /// json | raw | values | debug
    pub format: Option<String>,

    /// Worker threads; unset means one per logical CPU
    pub workers: Option<usize>,

    /// Stop discovery after this many processes
    #[serde(alias = "max-processes")]
    pub max_processes: Option<usize>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,

    /// File the values were loaded from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
            scope: Some(Filter::default().scope().to_string()),
            format: Some("debug".into()),
            workers: None,
            max_processes: None,
            log_level: Some("info".into()),
            source: None,
        }
    }
}

impl Config {
    pub fn filter(&self) -> Filter {
        self.scope
            .as_deref()
            .map(Filter::from_scope)
            .unwrap_or_default()
    }

    pub fn formatter(&self) -> Formatter {
        self.format
            .as_deref()
            .map(Formatter::from_name)
            .unwrap_or_default()
    }

    pub fn proc_root(&self) -> PathBuf {
        self.proc_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT))
    }
}

/// Validate effective config (used at startup)
pub fn validate_effective_config(cfg: &Config) -> anyhow::Result<()> {
    if cfg.workers == Some(0) {
        bail!("workers must be at least 1 (omit it to use one per CPU)");
    }

    if cfg.max_processes == Some(0) {
        bail!("max_processes must be at least 1");
    }

    if let Some(root) = &cfg.proc_root {
        if root.as_os_str().is_empty() {
            bail!("proc_root must not be empty");
        }
    }

    if let Some(format) = cfg.format.as_deref() {
        if !Formatter::is_known(format) {
            bail!(
                "Invalid format '{}', expected one of: {}",
                format,
                Formatter::NAMES.join(", ")
            );
        }
    }

    // Unknown scopes are accepted on purpose and resolve to "user"

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
    }
    if let Some(scope) = &args.scope {
        config.scope = Some(scope.clone());
    }
    if let Some(format) = &args.format {
        config.format = Some(format.clone());
    }
    if let Some(workers) = args.workers {
        config.workers = Some(workers);
    }
    if let Some(max) = args.max_processes {
        config.max_processes = Some(max);
    }

    Ok(config)
}

/// Loads a config file, or the first existing default location.
/// Fields missing from the file keep their built-in defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match DEFAULT_CONFIG_PATHS.iter().find(|p| Path::new(p).exists()) {
            Some(p) => PathBuf::from(p),
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let loaded: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?,
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in {}", path.display()))?,
        _ => {
            // Default to YAML
            serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML in {}", path.display()))?
        }
    };
    Ok(Config {
        source: Some(path),
        ..merge_defaults(loaded)
    })
}

fn merge_defaults(loaded: Config) -> Config {
    let defaults = Config::default();
    Config {
        proc_root: loaded.proc_root.or(defaults.proc_root),
        scope: loaded.scope.or(defaults.scope),
        format: loaded.format.or(defaults.format),
        workers: loaded.workers.or(defaults.workers),
        max_processes: loaded.max_processes.or(defaults.max_processes),
        log_level: loaded.log_level.or(defaults.log_level),
        source: None,
    }
}

/// Renders configuration in the requested format
pub fn render_config(config: &Config, format: &ConfigFormat) -> anyhow::Result<String> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}
