//! Per-process metadata lookups.
//!
//! Every lookup is independent: a failure only leaves its own field at the
//! default and never drops the descriptor. The [`Enricher`] trait is the seam
//! the scanner works against; [`ProcfsEnricher`] is the real implementation.

use nix::sys::stat::stat;
use nix::unistd::{Uid, User};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::trace;

use crate::error::ProcError;
use crate::process::descriptor::{Cgroup, ProcessDescriptor};
use crate::process::sched::{split_ioprio, IOPRIO_WHO_PROCESS};
use crate::process::stat::ProcessStat;

/// Default procfs mount point.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Source of the auxiliary per-process metadata.
pub trait Enricher: Sync {
    /// Numeric owner of the process.
    fn owner_uid(&self, pid: i32) -> Result<u32, ProcError>;

    /// User name for `uid`; `pid` is only used for error context.
    fn user_name(&self, pid: i32, uid: u32) -> Result<String, ProcError>;

    /// Raw control-group membership line.
    fn cgroup(&self, pid: i32) -> Result<String, ProcError>;

    fn oom_score_adj(&self, pid: i32) -> Result<i32, ProcError>;

    /// Raw ioprio value as returned by `ioprio_get(2)`.
    fn io_priority(&self, pid: i32) -> Result<i32, ProcError>;

    /// Runs all lookups for one parsed record.
    fn enrich(&self, stat: ProcessStat) -> ProcessDescriptor {
        let pid = stat.pid;
        let mut descriptor = ProcessDescriptor::new(stat);

        match self.owner_uid(pid) {
            Ok(uid) => {
                descriptor.set_owner(uid);
                match self.user_name(pid, uid) {
                    Ok(name) => descriptor.set_user(name),
                    Err(e) => trace!(pid, uid, error = %e, "user name lookup failed"),
                }
            }
            Err(e) => trace!(pid, error = %e, "owner lookup failed"),
        }

        match self.cgroup(pid) {
            Ok(line) => descriptor.set_cgroup(Cgroup::from_membership(&line)),
            Err(e) => trace!(pid, error = %e, "cgroup lookup failed"),
        }

        match self.oom_score_adj(pid) {
            Ok(score) => descriptor.set_oom_score_adj(score),
            Err(e) => trace!(pid, error = %e, "oom_score_adj lookup failed"),
        }

        match self.io_priority(pid) {
            Ok(ioprio) => {
                let (class, level) = split_ioprio(ioprio);
                descriptor.set_io_priority(class, level);
            }
            Err(e) => trace!(pid, error = %e, "ioprio lookup failed"),
        }

        descriptor
    }
}

/// Reads metadata from a procfs tree and the kernel.
#[derive(Debug, Clone)]
pub struct ProcfsEnricher {
    root: PathBuf,
}

impl Default for ProcfsEnricher {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT)
    }
}

impl ProcfsEnricher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pid_dir(&self, pid: i32) -> PathBuf {
        self.root.join(pid.to_string())
    }

    fn read_resource(&self, pid: i32, resource: &'static str) -> Result<String, ProcError> {
        read_lossy(&self.pid_dir(pid).join(resource))
            .map_err(|e| ProcError::unavailable(pid, resource, e))
    }

    /// Reads and parses `<root>/<pid>/stat`.
    pub fn read_stat(&self, pid: i32) -> Result<ProcessStat, ProcError> {
        let content = read_stat_file(&self.pid_dir(pid).join("stat"), pid)?;
        ProcessStat::parse(&content)
    }
}

/// Reads a procfs file as text. Command names may hold arbitrary bytes, so
/// invalid UTF-8 is replaced rather than rejected.
fn read_lossy(path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// Reads one stat file; any I/O failure means the process is gone or unreadable.
pub(crate) fn read_stat_file(path: &Path, pid: i32) -> Result<String, ProcError> {
    read_lossy(path).map_err(|source| {
        if source.kind() != ErrorKind::NotFound {
            trace!(pid, error = %source, "stat file unreadable");
        }
        ProcError::ProcessVanished { pid, source }
    })
}

/// Picks the unified-hierarchy line (`0::...`) if present, else the first line.
fn membership_line(content: &str) -> Option<&str> {
    let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());
    let first = lines.next()?;
    if first.starts_with("0::") {
        return Some(first);
    }
    lines.find(|l| l.starts_with("0::")).or(Some(first))
}

impl Enricher for ProcfsEnricher {
    fn owner_uid(&self, pid: i32) -> Result<u32, ProcError> {
        stat(&self.pid_dir(pid))
            .map(|st| st.st_uid)
            .map_err(|e| ProcError::unavailable(pid, "owner", e))
    }

    fn user_name(&self, pid: i32, uid: u32) -> Result<String, ProcError> {
        match User::from_uid(Uid::from_raw(uid)) {
            Ok(Some(user)) => Ok(user.name),
            Ok(None) => Err(ProcError::unavailable(
                pid,
                "user",
                format!("no passwd entry for uid {}", uid),
            )),
            Err(e) => Err(ProcError::unavailable(pid, "user", e)),
        }
    }

    fn cgroup(&self, pid: i32) -> Result<String, ProcError> {
        let content = self.read_resource(pid, "cgroup")?;
        membership_line(&content)
            .map(str::to_string)
            .ok_or_else(|| ProcError::unavailable(pid, "cgroup", "empty membership file"))
    }

    fn oom_score_adj(&self, pid: i32) -> Result<i32, ProcError> {
        let content = self.read_resource(pid, "oom_score_adj")?;
        content
            .trim()
            .parse()
            .map_err(|e| ProcError::unavailable(pid, "oom_score_adj", e))
    }

    fn io_priority(&self, pid: i32) -> Result<i32, ProcError> {
        // SAFETY: ioprio_get takes two integer arguments and touches no memory.
        let ret = unsafe {
            libc::syscall(
                libc::SYS_ioprio_get,
                IOPRIO_WHO_PROCESS,
                pid as libc::c_int,
            )
        };
        if ret < 0 {
            return Err(ProcError::unavailable(
                pid,
                "ioprio",
                std::io::Error::last_os_error(),
            ));
        }
        i32::try_from(ret).map_err(|e| ProcError::unavailable(pid, "ioprio", e))
    }
}
