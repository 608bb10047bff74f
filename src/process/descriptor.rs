//! Enriched process descriptor: one parsed stat record plus ownership,
//! control-group, OOM and I/O scheduling metadata.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::process::sched::{self, CPU, IO};
use crate::process::stat::ProcessStat;

/// Owner id recorded when the owner lookup failed.
pub const UID_UNKNOWN: i64 = -1;

/// Membership string of the root control group.
pub const ROOT_CGROUP: &str = "0::/";

/// Top-level slice that systemd places interactive user sessions in.
pub const USER_SLICE: &str = "user.slice";

/// Control-group membership split into its interesting parts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Cgroup {
    /// Full membership line, e.g. `0::/user.slice/user-1000.slice/session-2.scope`.
    pub path: String,
    /// First path segment (`user.slice`, `system.slice`, ...).
    pub slice: String,
    /// Last path segment.
    pub leaf: String,
}

impl Cgroup {
    /// Classifies one membership line. The root cgroup keeps empty slice names.
    pub fn from_membership(line: &str) -> Self {
        let line = line.trim();
        if line == ROOT_CGROUP {
            return Cgroup {
                path: ROOT_CGROUP.to_string(),
                ..Cgroup::default()
            };
        }
        let parts: Vec<&str> = line.split('/').collect();
        Cgroup {
            path: line.to_string(),
            slice: parts.get(1).copied().unwrap_or_default().to_string(),
            leaf: parts.last().copied().unwrap_or_default().to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

/// A process as seen by one scan.
///
/// Fields are private; construction goes through the enricher so a
/// descriptor is immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessDescriptor {
    #[serde(flatten)]
    stat: ProcessStat,
    uid: i64,
    #[serde(rename = "user")]
    user: String,
    cgroup: Cgroup,
    oom_score_adj: i32,
    #[serde(rename = "ioprio_class")]
    io_class: i32,
    #[serde(rename = "ionice")]
    io_level: i32,
}

impl ProcessDescriptor {
    /// A descriptor with every enrichment field at its default.
    pub fn new(stat: ProcessStat) -> Self {
        Self {
            stat,
            uid: UID_UNKNOWN,
            user: String::new(),
            cgroup: Cgroup::default(),
            oom_score_adj: 0,
            io_class: 0,
            io_level: 0,
        }
    }

    pub(crate) fn set_owner(&mut self, uid: u32) {
        self.uid = i64::from(uid);
    }

    pub(crate) fn set_user(&mut self, user: String) {
        self.user = user;
    }

    pub(crate) fn set_cgroup(&mut self, cgroup: Cgroup) {
        self.cgroup = cgroup;
    }

    pub(crate) fn set_oom_score_adj(&mut self, score: i32) {
        self.oom_score_adj = score;
    }

    pub(crate) fn set_io_priority(&mut self, class: i32, level: i32) {
        self.io_class = class;
        self.io_level = level;
    }

    /// Builds the descriptor of the calling process from `/proc`.
    pub fn calling() -> Result<Self, crate::error::ProcError> {
        Self::calling_from(crate::process::enrich::DEFAULT_PROC_ROOT)
    }

    /// Builds the descriptor of the calling process from the procfs tree
    /// mounted at `root`.
    pub fn calling_from(root: impl Into<PathBuf>) -> Result<Self, crate::error::ProcError> {
        use crate::process::enrich::{Enricher, ProcfsEnricher};

        let enricher = ProcfsEnricher::new(root);
        let pid = std::process::id() as i32;
        let stat = enricher.read_stat(pid)?;
        Ok(enricher.enrich(stat))
    }

    pub fn stat(&self) -> &ProcessStat {
        &self.stat
    }

    pub fn pid(&self) -> i32 {
        self.stat.pid
    }

    pub fn ppid(&self) -> i32 {
        self.stat.ppid
    }

    pub fn pgrp(&self) -> i32 {
        self.stat.pgrp
    }

    pub fn comm(&self) -> &str {
        &self.stat.comm
    }

    pub fn state(&self) -> char {
        self.stat.state
    }

    pub fn priority(&self) -> i64 {
        self.stat.priority
    }

    pub fn nice(&self) -> i64 {
        self.stat.nice
    }

    pub fn num_threads(&self) -> i64 {
        self.stat.num_threads
    }

    pub fn rt_priority(&self) -> u32 {
        self.stat.rt_priority
    }

    pub fn policy(&self) -> u32 {
        self.stat.policy
    }

    /// Owner uid, or [`UID_UNKNOWN`].
    pub fn uid(&self) -> i64 {
        self.uid
    }

    /// Owner user name; empty when it could not be resolved.
    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn cgroup(&self) -> &Cgroup {
        &self.cgroup
    }

    pub fn oom_score_adj(&self) -> i32 {
        self.oom_score_adj
    }

    pub fn io_class(&self) -> i32 {
        self.io_class
    }

    pub fn io_level(&self) -> i32 {
        self.io_level
    }

    pub fn in_user_slice(&self) -> bool {
        self.cgroup.slice == USER_SLICE
    }

    pub fn in_system_slice(&self) -> bool {
        !self.in_user_slice()
    }

    /// Short scheduling policy name (`other`, `fifo`, ...).
    pub fn sched_name(&self) -> &'static str {
        sched::short_policy_name(self.stat.policy as i32)
    }

    /// Canonical scheduling policy name (`SCHED_OTHER`, ...), empty when unknown.
    pub fn sched_class_name(&self) -> &'static str {
        CPU.name(self.stat.policy as i32).unwrap_or_default()
    }

    /// `policy:name:rt_priority`
    pub fn cpu_sched_info(&self) -> String {
        format!(
            "{}:{}:{}",
            self.stat.policy,
            self.sched_name(),
            self.stat.rt_priority
        )
    }

    /// I/O class name (`best-effort`, ...), empty when unknown.
    pub fn io_class_name(&self) -> &'static str {
        IO.name(self.io_class).unwrap_or_default()
    }

    /// `class:name:level`
    pub fn io_sched_info(&self) -> String {
        format!(
            "{}:{}:{}",
            self.io_class,
            self.io_class_name(),
            self.io_level
        )
    }
}

impl fmt::Display for ProcessDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{stat: {}, uid: {}, user: {}, cgroup: [{} {} {}], rt_priority: {}, policy: {}, \
             oom_score_adj: {}, io_level: {}, io_class: {}}}",
            self.stat,
            self.uid,
            self.user,
            self.cgroup.path,
            self.cgroup.slice,
            self.cgroup.leaf,
            self.stat.rt_priority,
            self.stat.policy,
            self.oom_score_adj,
            self.io_level,
            self.io_class
        )
    }
}
