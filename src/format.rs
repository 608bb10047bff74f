//! Line renderings of a process descriptor.

use serde::{Deserialize, Serialize};

use crate::process::ProcessDescriptor;

/// Output format for one descriptor per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Formatter {
    /// JSON object.
    Json,
    /// Space-separated field values.
    Raw,
    /// Bracketed list with quoted strings.
    Values,
    /// Full struct dump.
    #[default]
    Debug,
}

impl Formatter {
    pub const NAMES: [&'static str; 4] = ["json", "raw", "values", "debug"];

    /// Case-insensitive; unknown names render as [`Formatter::Debug`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Formatter::Json,
            "raw" => Formatter::Raw,
            "values" => Formatter::Values,
            _ => Formatter::Debug,
        }
    }

    pub fn is_known(name: &str) -> bool {
        Self::NAMES.contains(&name.trim().to_ascii_lowercase().as_str())
    }

    pub fn render(&self, p: &ProcessDescriptor) -> Result<String, serde_json::Error> {
        Ok(match self {
            Formatter::Json => serde_json::to_string(p)?,
            Formatter::Raw => raw(p),
            Formatter::Values => values(p)?,
            Formatter::Debug => p.to_string(),
        })
    }
}

fn raw(p: &ProcessDescriptor) -> String {
    format!(
        "{} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {}",
        p.pid(),
        p.ppid(),
        p.pgrp(),
        p.uid(),
        p.user(),
        p.state(),
        p.comm(),
        p.cgroup().path,
        p.priority(),
        p.nice(),
        p.num_threads(),
        p.rt_priority(),
        p.policy(),
        p.oom_score_adj(),
        p.io_class(),
        p.io_level()
    )
}

fn values(p: &ProcessDescriptor) -> Result<String, serde_json::Error> {
    // JSON string quoting escapes command names with quotes or control chars
    let q = |s: &str| serde_json::to_string(s);
    Ok(format!(
        "[{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}]",
        p.pid(),
        p.ppid(),
        p.pgrp(),
        p.uid(),
        q(p.user())?,
        q(&p.state().to_string())?,
        q(&p.cgroup().slice)?,
        q(&p.cgroup().leaf)?,
        q(p.comm())?,
        q(&p.cgroup().path)?,
        p.priority(),
        p.nice(),
        p.num_threads(),
        p.rt_priority(),
        p.policy(),
        p.oom_score_adj(),
        q(p.io_class_name())?,
        p.io_level()
    ))
}
