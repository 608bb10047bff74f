//! Parser for the kernel's per-process status line (`/proc/<pid>/stat`).
//!
//! The command name sits between the first `(` and the *last* `)` because it
//! may contain spaces and parentheses itself. Everything after it is a fixed,
//! whitespace-delimited sequence decoded by position (see proc(5)).

use serde::Serialize;
use std::fmt;
use std::str::{FromStr, SplitAsciiWhitespace};

use crate::error::ProcError;

/// Number of fields in a stat record, counting pid and comm.
pub const STAT_FIELD_COUNT: usize = 52;

/// One decoded `/proc/<pid>/stat` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessStat {
    pub pid: i32,
    pub comm: String,
    pub state: char,
    pub ppid: i32,
    pub pgrp: i32,
    pub session: i32,
    pub tty_nr: i32,
    pub tpgid: i32,
    pub flags: u32,
    pub min_flt: u64,
    pub cmin_flt: u64,
    pub maj_flt: u64,
    pub cmaj_flt: u64,
    pub utime: u64,
    pub stime: u64,
    pub cutime: i64,
    pub cstime: i64,
    pub priority: i64,
    pub nice: i64,
    pub num_threads: i64,
    pub itrealvalue: i64,
    pub start_time: u64,
    pub vsize: u64,
    pub rss: i64,
    pub rss_limit: u64,
    pub start_code: u64,
    pub end_code: u64,
    pub start_stack: u64,
    pub kstk_esp: u64,
    pub kstk_eip: u64,
    pub signal: u64,
    pub blocked: u64,
    pub sig_ignore: u64,
    pub sig_catch: u64,
    pub wchan: u64,
    pub nswap: u64,
    pub cnswap: u64,
    pub exit_signal: i32,
    pub processor: i32,
    pub rt_priority: u32,
    pub policy: u32,
    pub delayacct_blkio_ticks: u64,
    pub guest_time: u64,
    pub cguest_time: i64,
    pub start_data: u64,
    pub end_data: u64,
    pub start_brk: u64,
    pub arg_start: u64,
    pub arg_end: u64,
    pub env_start: u64,
    pub env_end: u64,
    pub exit_code: i32,
}

/// Positional cursor over the fields following the command name.
struct Fields<'a> {
    inner: SplitAsciiWhitespace<'a>,
    // 1-based field number of the next token, as numbered in proc(5)
    position: usize,
}

impl<'a> Fields<'a> {
    fn new(rest: &'a str) -> Self {
        Self {
            inner: rest.split_ascii_whitespace(),
            position: 3,
        }
    }

    fn raw(&mut self, name: &'static str) -> Result<&'a str, ProcError> {
        let position = self.position;
        self.position += 1;
        self.inner.next().ok_or_else(|| {
            ProcError::malformed(format!(
                "record truncated at field {} ({}), expected {} fields",
                position, name, STAT_FIELD_COUNT
            ))
        })
    }

    fn next<T: FromStr>(&mut self, name: &'static str) -> Result<T, ProcError>
    where
        T::Err: fmt::Display,
    {
        let position = self.position;
        let token = self.raw(name)?;
        token.parse().map_err(|e| {
            ProcError::malformed(format!(
                "field {} ({}) = {:?}: {}",
                position, name, token, e
            ))
        })
    }

    fn state(&mut self) -> Result<char, ProcError> {
        let token = self.raw("state")?;
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(ProcError::malformed(format!(
                "field 3 (state) = {:?}: expected a single character",
                token
            ))),
        }
    }
}

impl ProcessStat {
    /// Parses a single stat record. A trailing newline is accepted.
    pub fn parse(record: &str) -> Result<Self, ProcError> {
        let record = record.trim_end_matches(['\n', '\r']);

        let open = record
            .find('(')
            .ok_or_else(|| ProcError::malformed("missing '(' before command name"))?;
        let close = record
            .rfind(')')
            .filter(|&close| close > open)
            .ok_or_else(|| ProcError::malformed("missing ')' after command name"))?;

        let pid_token = record[..open].trim();
        let pid: i32 = pid_token.parse().map_err(|e| {
            ProcError::malformed(format!("field 1 (pid) = {:?}: {}", pid_token, e))
        })?;
        if pid <= 0 {
            return Err(ProcError::malformed(format!(
                "field 1 (pid) = {}: must be positive",
                pid
            )));
        }

        let comm = record[open + 1..close].to_string();
        let mut f = Fields::new(&record[close + 1..]);

        // Struct literal fields are evaluated in source order, which must
        // follow the kernel's field order.
        Ok(ProcessStat {
            pid,
            comm,
            state: f.state()?,
            ppid: f.next("ppid")?,
            pgrp: f.next("pgrp")?,
            session: f.next("session")?,
            tty_nr: f.next("tty_nr")?,
            tpgid: f.next("tpgid")?,
            flags: f.next("flags")?,
            min_flt: f.next("minflt")?,
            cmin_flt: f.next("cminflt")?,
            maj_flt: f.next("majflt")?,
            cmaj_flt: f.next("cmajflt")?,
            utime: f.next("utime")?,
            stime: f.next("stime")?,
            cutime: f.next("cutime")?,
            cstime: f.next("cstime")?,
            priority: f.next("priority")?,
            nice: f.next("nice")?,
            num_threads: f.next("num_threads")?,
            itrealvalue: f.next("itrealvalue")?,
            start_time: f.next("starttime")?,
            vsize: f.next("vsize")?,
            rss: f.next("rss")?,
            rss_limit: f.next("rsslim")?,
            start_code: f.next("startcode")?,
            end_code: f.next("endcode")?,
            start_stack: f.next("startstack")?,
            kstk_esp: f.next("kstkesp")?,
            kstk_eip: f.next("kstkeip")?,
            signal: f.next("signal")?,
            blocked: f.next("blocked")?,
            sig_ignore: f.next("sigignore")?,
            sig_catch: f.next("sigcatch")?,
            wchan: f.next("wchan")?,
            nswap: f.next("nswap")?,
            cnswap: f.next("cnswap")?,
            exit_signal: f.next("exit_signal")?,
            processor: f.next("processor")?,
            rt_priority: f.next("rt_priority")?,
            policy: f.next("policy")?,
            delayacct_blkio_ticks: f.next("delayacct_blkio_ticks")?,
            guest_time: f.next("guest_time")?,
            cguest_time: f.next("cguest_time")?,
            start_data: f.next("start_data")?,
            end_data: f.next("end_data")?,
            start_brk: f.next("start_brk")?,
            arg_start: f.next("arg_start")?,
            arg_end: f.next("arg_end")?,
            env_start: f.next("env_start")?,
            env_end: f.next("env_end")?,
            exit_code: f.next("exit_code")?,
        })
    }

    /// Renders the record back into the kernel's stat line layout (no newline).
    pub fn to_record(&self) -> String {
        format!(
            "{} ({}) {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} \
             {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {}",
            self.pid,
            self.comm,
            self.state,
            self.ppid,
            self.pgrp,
            self.session,
            self.tty_nr,
            self.tpgid,
            self.flags,
            self.min_flt,
            self.cmin_flt,
            self.maj_flt,
            self.cmaj_flt,
            self.utime,
            self.stime,
            self.cutime,
            self.cstime,
            self.priority,
            self.nice,
            self.num_threads,
            self.itrealvalue,
            self.start_time,
            self.vsize,
            self.rss,
            self.rss_limit,
            self.start_code,
            self.end_code,
            self.start_stack,
            self.kstk_esp,
            self.kstk_eip,
            self.signal,
            self.blocked,
            self.sig_ignore,
            self.sig_catch,
            self.wchan,
            self.nswap,
            self.cnswap,
            self.exit_signal,
            self.processor,
            self.rt_priority,
            self.policy,
            self.delayacct_blkio_ticks,
            self.guest_time,
            self.cguest_time,
            self.start_data,
            self.end_data,
            self.start_brk,
            self.arg_start,
            self.arg_end,
            self.env_start,
            self.env_end,
            self.exit_code,
        )
    }
}

impl FromStr for ProcessStat {
    type Err = ProcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProcessStat::parse(s)
    }
}

impl fmt::Display for ProcessStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{pid: {}, comm: {}, state: {}, ppid: {}, pgrp: {}, session: {}, \
             tty_nr: {}, tpgid: {}, flags: {}, ",
            self.pid,
            self.comm,
            self.state,
            self.ppid,
            self.pgrp,
            self.session,
            self.tty_nr,
            self.tpgid,
            self.flags
        )?;
        write!(
            f,
            "minflt: {}, cminflt: {}, majflt: {}, cmajflt: {}, utime: {}, stime: {}, \
             cutime: {}, cstime: {}, priority: {}, nice: {}, num_threads: {}, \
             itrealvalue: {}, starttime: {}, ",
            self.min_flt,
            self.cmin_flt,
            self.maj_flt,
            self.cmaj_flt,
            self.utime,
            self.stime,
            self.cutime,
            self.cstime,
            self.priority,
            self.nice,
            self.num_threads,
            self.itrealvalue,
            self.start_time
        )?;
        write!(
            f,
            "vsize: {}, rss: {}, rsslim: {}, startcode: {}, endcode: {}, startstack: {}, \
             kstkesp: {}, kstkeip: {}, signal: {}, blocked: {}, sigignore: {}, \
             sigcatch: {}, wchan: {}, nswap: {}, cnswap: {}, ",
            self.vsize,
            self.rss,
            self.rss_limit,
            self.start_code,
            self.end_code,
            self.start_stack,
            self.kstk_esp,
            self.kstk_eip,
            self.signal,
            self.blocked,
            self.sig_ignore,
            self.sig_catch,
            self.wchan,
            self.nswap,
            self.cnswap
        )?;
        write!(
            f,
            "exit_signal: {}, processor: {}, rt_priority: {}, policy: {}, \
             delayacct_blkio_ticks: {}, guest_time: {}, cguest_time: {}, \
             start_data: {}, end_data: {}, start_brk: {}, arg_start: {}, arg_end: {}, \
             env_start: {}, env_end: {}, exit_code: {}}}",
            self.exit_signal,
            self.processor,
            self.rt_priority,
            self.policy,
            self.delayacct_blkio_ticks,
            self.guest_time,
            self.cguest_time,
            self.start_data,
            self.end_data,
            self.start_brk,
            self.arg_start,
            self.arg_end,
            self.env_start,
            self.env_end,
            self.exit_code
        )
    }
}
