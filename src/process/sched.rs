//! CPU scheduling policy and I/O priority class tables.
//!
//! Both tables are built once on first use and are read-only afterwards.

use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;
use std::io;

use crate::error::ProcError;

/// `ioprio_get(2)` "who" selector for a single process.
pub const IOPRIO_WHO_PROCESS: libc::c_int = 1;
/// The class lives above this bit in an ioprio value.
pub const IOPRIO_CLASS_SHIFT: u32 = 13;
/// Mask for the priority level (the kernel reserves the low 13 bits; levels use 8).
pub const IOPRIO_LEVEL_MASK: i32 = 0xff;

pub const IOPRIO_CLASS_NONE: i32 = 0;
pub const IOPRIO_CLASS_RT: i32 = 1;
pub const IOPRIO_CLASS_BE: i32 = 2;
pub const IOPRIO_CLASS_IDLE: i32 = 3;

pub const SCHED_OTHER: i32 = 0;
pub const SCHED_FIFO: i32 = 1;
pub const SCHED_RR: i32 = 2;
pub const SCHED_BATCH: i32 = 3;
pub const SCHED_ISO: i32 = 4;
pub const SCHED_IDLE: i32 = 5;
pub const SCHED_DEADLINE: i32 = 6;

/// Classification table for one kind of scheduler.
#[derive(Debug)]
pub struct SchedulingPolicy {
    /// Class id to canonical name.
    pub class: HashMap<i32, &'static str>,
    /// Classes that take an explicit priority.
    pub need_priority: &'static [i32],
    /// Classes that require elevated privileges to set.
    pub need_credentials: &'static [i32],
    pub low: i32,
    pub high: i32,
    pub none: i32,
}

impl SchedulingPolicy {
    /// Canonical class name, `None` for unknown ids.
    pub fn name(&self, class: i32) -> Option<&'static str> {
        self.class.get(&class).copied()
    }

    pub fn needs_priority(&self, class: i32) -> bool {
        self.need_priority.contains(&class)
    }

    pub fn needs_credentials(&self, class: i32) -> bool {
        self.need_credentials.contains(&class)
    }

    /// Reverse lookup, case-insensitive.
    pub fn class_of(&self, name: &str) -> Option<i32> {
        self.class
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(id, _)| *id)
    }

    /// Checks a priority against the `[min(low, high), max(low, high)]` range.
    pub fn priority_in_range(&self, priority: i32) -> bool {
        let (lo, hi) = if self.low <= self.high {
            (self.low, self.high)
        } else {
            (self.high, self.low)
        };
        (lo..=hi).contains(&priority)
    }
}

/// CPU scheduling policies (`sched_setscheduler(2)`).
pub static CPU: Lazy<SchedulingPolicy> = Lazy::new(|| {
    let class = HashMap::from_iter([
        (SCHED_OTHER, "SCHED_OTHER"),
        (SCHED_FIFO, "SCHED_FIFO"),
        (SCHED_RR, "SCHED_RR"),
        (SCHED_BATCH, "SCHED_BATCH"),
        // SCHED_ISO is reserved but not implemented in Linux
        (SCHED_IDLE, "SCHED_IDLE"),
        (SCHED_DEADLINE, "SCHED_DEADLINE"),
    ]);
    SchedulingPolicy {
        class,
        need_priority: &[SCHED_FIFO, SCHED_RR],
        need_credentials: &[SCHED_FIFO, SCHED_RR],
        low: 1,
        high: 99,
        none: 0,
    }
});

/// I/O scheduling classes (`ioprio_set(2)`). Level 0 is the highest priority.
pub static IO: Lazy<SchedulingPolicy> = Lazy::new(|| {
    let class = HashMap::from_iter([
        (IOPRIO_CLASS_NONE, "none"),
        (IOPRIO_CLASS_RT, "realtime"),
        (IOPRIO_CLASS_BE, "best-effort"),
        (IOPRIO_CLASS_IDLE, "idle"),
    ]);
    SchedulingPolicy {
        class,
        need_priority: &[IOPRIO_CLASS_RT, IOPRIO_CLASS_BE],
        need_credentials: &[IOPRIO_CLASS_RT],
        low: 7,
        high: 0,
        none: 4,
    }
});

/// Short lowercase policy name used in compact renderings (`other`, `fifo`, ...).
pub fn short_policy_name(policy: i32) -> &'static str {
    match policy {
        SCHED_OTHER => "other",
        SCHED_FIFO => "fifo",
        SCHED_RR => "rr",
        SCHED_BATCH => "batch",
        SCHED_IDLE => "idle",
        SCHED_DEADLINE => "deadline",
        _ => "",
    }
}

/// Splits a raw ioprio value into `(class, level)`.
pub fn split_ioprio(ioprio: i32) -> (i32, i32) {
    (ioprio >> IOPRIO_CLASS_SHIFT, ioprio & IOPRIO_LEVEL_MASK)
}

/// Builds a raw ioprio value from class and level.
pub fn make_ioprio(class: i32, level: i32) -> i32 {
    (class << IOPRIO_CLASS_SHIFT) | (level & IOPRIO_LEVEL_MASK)
}

/// Live CPU scheduling policy of `pid` (`sched_getscheduler(2)`); 0 means
/// the calling process.
pub fn current_policy(pid: i32) -> Result<i32, ProcError> {
    // SAFETY: takes a pid by value and touches no memory.
    let policy = unsafe { libc::sched_getscheduler(pid as libc::pid_t) };
    if policy < 0 {
        return Err(ProcError::unavailable(pid, "sched_policy", io::Error::last_os_error()));
    }
    // Strip SCHED_RESET_ON_FORK
    Ok(policy & !libc::SCHED_RESET_ON_FORK)
}

/// Live real-time priority of `pid` (`sched_getparam(2)`).
pub fn current_rt_priority(pid: i32) -> Result<i32, ProcError> {
    // SAFETY: sched_param is plain integers, so all-zero is valid; the
    // kernel writes into an exclusively borrowed value.
    let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
    let ret = unsafe { libc::sched_getparam(pid as libc::pid_t, &mut param) };
    if ret < 0 {
        return Err(ProcError::unavailable(pid, "sched_param", io::Error::last_os_error()));
    }
    Ok(param.sched_priority)
}
