//! Process discovery and the concurrent scan pipeline.
//!
//! A scan enumerates `<root>/<pid>` directories, reads every stat record on a
//! feeder thread, and hands the raw text to a fixed pool of workers over a
//! bounded queue. Workers parse, enrich and filter independently and push
//! accepted descriptors onto a results queue that the calling thread drains.
//! Both queues are sized to the discovered process count, so no send can
//! block forever. The result is sorted by pid once everything is collected.

use crossbeam_channel::{Receiver, Sender};
use nix::unistd::getuid;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

use crate::error::ProcError;
use crate::filter::Filter;
use crate::process::descriptor::ProcessDescriptor;
use crate::process::enrich::{read_stat_file, Enricher, ProcfsEnricher, DEFAULT_PROC_ROOT};
use crate::process::stat::ProcessStat;

/// Process entry representing a directory in the procfs tree.
#[derive(Debug, Clone)]
pub struct ProcEntry {
    pub pid: i32,
    pub proc_path: PathBuf,
}

impl ProcEntry {
    pub fn stat_path(&self) -> PathBuf {
        self.proc_path.join("stat")
    }
}

/// Scans `root` for process entries with numeric PIDs.
///
/// Failing to list `root` at all is the only scan-fatal error.
pub fn collect_proc_entries(root: &Path, max: Option<usize>) -> Result<Vec<ProcEntry>, ProcError> {
    let entries = fs::read_dir(root).map_err(|source| ProcError::DiscoveryFailed {
        path: root.to_path_buf(),
        source,
    })?;

    let mut out = Vec::new();
    for entry in entries.flatten() {
        let p = entry.path();
        let name = match p.file_name().and_then(|s| s.to_str()) {
            Some(v) => v,
            None => continue,
        };
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let pid: i32 = match name.parse() {
            Ok(v) if v > 0 => v,
            _ => continue,
        };
        out.push(ProcEntry { pid, proc_path: p });
        if let Some(maxp) = max {
            if out.len() >= maxp {
                break;
            }
        }
    }
    Ok(out)
}

/// Shared flag used to abandon a running scan.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Tuning knobs for a scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Worker pool size; `None` (or 0) uses the number of logical CPUs.
    pub workers: Option<usize>,
    /// Stop discovery after this many entries.
    pub max_processes: Option<usize>,
    pub cancel: CancelFlag,
}

/// Per-worker counters, merged after the pool is joined.
#[derive(Debug, Default, Clone, Copy)]
struct WorkerStats {
    processed: usize,
    malformed: usize,
    accepted: usize,
}

/// Takes process snapshots of one procfs tree.
#[derive(Debug, Clone)]
pub struct Scanner<E = ProcfsEnricher> {
    root: PathBuf,
    enricher: E,
    options: ScanOptions,
}

impl Default for Scanner<ProcfsEnricher> {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT)
    }
}

impl Scanner<ProcfsEnricher> {
    /// Scanner over `root` using procfs-backed enrichment of the same tree.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let enricher = ProcfsEnricher::new(root.clone());
        Self::with_enricher(root, enricher)
    }
}

impl<E: Enricher> Scanner<E> {
    pub fn with_enricher(root: impl Into<PathBuf>, enricher: E) -> Self {
        Self {
            root: root.into(),
            enricher,
            options: ScanOptions::default(),
        }
    }

    pub fn options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.options.workers = Some(workers);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.options.cancel
    }

    /// Effective worker pool size.
    pub fn worker_count(&self) -> usize {
        match self.options.workers {
            Some(n) if n > 0 => n,
            _ => thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }

    /// Snapshot of the processes accepted by `filter`, on behalf of the
    /// calling user.
    pub fn scan(&self, filter: Filter) -> Result<Vec<ProcessDescriptor>, ProcError> {
        self.scan_as(filter, getuid().as_raw())
    }

    /// Same as [`Scanner::scan`] with an explicit caller uid for the `user` scope.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn scan_as(
        &self,
        filter: Filter,
        caller_uid: u32,
    ) -> Result<Vec<ProcessDescriptor>, ProcError> {
        let start = Instant::now();
        let entries = collect_proc_entries(&self.root, self.options.max_processes)?;
        let discovered = entries.len();
        debug!("Collected {} process entries from {}", discovered, self.root.display());

        // Pre-sized so that neither the feeder nor the workers block on a full queue
        let capacity = discovered.max(1);
        let (work_tx, work_rx) = crossbeam_channel::bounded::<String>(capacity);
        let (result_tx, result_rx) = crossbeam_channel::bounded::<ProcessDescriptor>(capacity);
        let worker_count = self.worker_count();
        let cancel = &self.options.cancel;
        let enricher = &self.enricher;

        let (mut results, vanished, totals) = thread::scope(|s| {
            let feeder = s.spawn(move || dispatch(&entries, work_tx, cancel));

            let workers: Vec<_> = (0..worker_count)
                .map(|_| {
                    let rx = work_rx.clone();
                    let tx = result_tx.clone();
                    s.spawn(move || run_worker(enricher, filter, caller_uid, rx, tx, cancel))
                })
                .collect();

            // Only the workers hold queue ends from here on: the results queue
            // closes exactly when the last worker exits.
            drop(work_rx);
            drop(result_tx);

            let results: Vec<ProcessDescriptor> = result_rx.iter().collect();

            let vanished = feeder.join().unwrap_or_else(|_| {
                error!("Scan feeder thread panicked");
                0
            });
            let mut totals = WorkerStats::default();
            for handle in workers {
                match handle.join() {
                    Ok(stats) => {
                        totals.processed += stats.processed;
                        totals.malformed += stats.malformed;
                        totals.accepted += stats.accepted;
                    }
                    Err(_) => error!("Scan worker thread panicked"),
                }
            }
            (results, vanished, totals)
        });

        results.sort_by_key(|p| p.pid());

        if cancel.is_cancelled() {
            info!("Scan cancelled after collecting {} processes", results.len());
        }
        info!(
            scope = filter.scope(),
            workers = worker_count,
            discovered,
            vanished,
            processed = totals.processed,
            malformed = totals.malformed,
            accepted = totals.accepted,
            "Scan finished in {:.2}ms",
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(results)
    }
}

/// Reads every stat record and queues the raw text. Returns the number of
/// processes that disappeared before they could be read.
fn dispatch(entries: &[ProcEntry], work: Sender<String>, cancel: &CancelFlag) -> usize {
    let mut vanished = 0;
    for entry in entries {
        if cancel.is_cancelled() {
            break;
        }
        match read_stat_file(&entry.stat_path(), entry.pid) {
            Ok(raw) => {
                if work.send(raw).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("Skipping process {}: {}", entry.pid, e);
                vanished += 1;
            }
        }
    }
    vanished
}

fn run_worker<E: Enricher>(
    enricher: &E,
    filter: Filter,
    caller_uid: u32,
    work: Receiver<String>,
    results: Sender<ProcessDescriptor>,
    cancel: &CancelFlag,
) -> WorkerStats {
    let mut stats = WorkerStats::default();
    for raw in work.iter() {
        if cancel.is_cancelled() {
            break;
        }
        stats.processed += 1;

        let outcome = ProcessStat::parse(&raw).map(|stat| enricher.enrich(stat));
        if let Err(e) = &outcome {
            debug!("Dropping record: {}", e);
            stats.malformed += 1;
        }
        if !filter.accepts_for(&outcome, caller_uid) {
            continue;
        }
        if let Ok(descriptor) = outcome {
            if results.send(descriptor).is_err() {
                break;
            }
            stats.accepted += 1;
        }
    }
    stats
}

/// Snapshot of `/proc` under `filter`, using every logical CPU.
pub fn snapshot(filter: Filter) -> Result<Vec<ProcessDescriptor>, ProcError> {
    Scanner::default().scan(filter)
}

/// Snapshot of every readable process in `/proc`.
pub fn snapshot_all() -> Result<Vec<ProcessDescriptor>, ProcError> {
    snapshot(Filter::All)
}
