//! Process-related modules for parsing, enrichment and scanning.
//!
//! This module provides:
//! - `stat`: `/proc/<pid>/stat` record parser
//! - `sched`: CPU scheduling policy and I/O class tables
//! - `descriptor`: enriched per-process descriptor
//! - `enrich`: owner, cgroup, OOM and ioprio lookups
//! - `scanner`: process discovery and the concurrent scan pipeline

pub mod descriptor;
pub mod enrich;
pub mod sched;
pub mod scanner;
pub mod stat;

// Re-export commonly used types
pub use descriptor::{Cgroup, ProcessDescriptor, ROOT_CGROUP, UID_UNKNOWN, USER_SLICE};
pub use enrich::{Enricher, ProcfsEnricher, DEFAULT_PROC_ROOT};
pub use sched::{current_policy, current_rt_priority, SchedulingPolicy, CPU, IO};
pub use scanner::{collect_proc_entries, CancelFlag, ProcEntry, ScanOptions, Scanner};
pub use stat::{ProcessStat, STAT_FIELD_COUNT};
