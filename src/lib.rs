//! Herakles Process Snapshot Library
//!
//! Takes a point-in-time inventory of the Linux process table. Every
//! `/proc/<pid>/stat` record is parsed, enriched with owner, control-group,
//! OOM score adjustment and I/O scheduling metadata, filtered by scope and
//! returned ordered by pid.
//!
//! # Features
//!
//! - **Strict stat parsing**: positional decode of all 52 fields, command
//!   names with spaces and parentheses included
//! - **Independent enrichment**: a failed lookup leaves only its own field at
//!   the default
//! - **Scoped filtering**: `all`, `global`, `system` and `user` scopes
//! - **Parallel scanning**: bounded work queue drained by a fixed worker pool
//!
//! # Usage
//!
//! ```rust,no_run
//! use herakles_proc_snapshot::{Filter, Scanner};
//!
//! let procs = Scanner::new("/proc")
//!     .workers(4)
//!     .scan(Filter::from_scope("system"))?;
//!
//! for p in &procs {
//!     println!("{} {} {}", p.pid(), p.comm(), p.cgroup().slice);
//! }
//! # Ok::<(), herakles_proc_snapshot::ProcError>(())
//! ```

pub mod error;
pub mod filter;
pub mod format;
pub mod process;

// Re-export main types for convenience
pub use error::ProcError;
pub use filter::Filter;
pub use format::Formatter;
pub use process::scanner::{snapshot, snapshot_all};
pub use process::{
    Cgroup, Enricher, ProcessDescriptor, ProcessStat, ProcfsEnricher, ScanOptions, Scanner,
    DEFAULT_PROC_ROOT,
};
