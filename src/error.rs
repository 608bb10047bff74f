//! Error taxonomy for process snapshots.
//!
//! Only [`ProcError::DiscoveryFailed`] ever reaches the caller of a scan.
//! The other variants are recovered per record or per field inside the
//! pipeline and only show up in debug logs.

use std::path::PathBuf;

/// Errors raised while reading, parsing or enriching process records.
#[derive(Debug, thiserror::Error)]
pub enum ProcError {
    /// The text record does not match the kernel stat layout.
    #[error("Malformed stat record: {reason}")]
    MalformedRecord { reason: String },

    /// The process exited between discovery and read.
    #[error("Process {pid} vanished: {source}")]
    ProcessVanished {
        pid: i32,
        #[source]
        source: std::io::Error,
    },

    /// One auxiliary lookup (owner, cgroup, OOM score, I/O priority) failed.
    #[error("{lookup} unavailable for pid {pid}: {reason}")]
    EnrichmentUnavailable {
        pid: i32,
        lookup: &'static str,
        reason: String,
    },

    /// The process table itself could not be enumerated.
    #[error("Cannot enumerate processes under {}: {source}", path.display())]
    DiscoveryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProcError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        ProcError::MalformedRecord {
            reason: reason.into(),
        }
    }

    pub(crate) fn unavailable(pid: i32, lookup: &'static str, reason: impl ToString) -> Self {
        ProcError::EnrichmentUnavailable {
            pid,
            lookup,
            reason: reason.to_string(),
        }
    }
}
