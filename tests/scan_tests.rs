//! Integration tests for the scan pipeline.
//!
//! These tests build synthetic procfs trees in temp directories and scan
//! them through the public API, with a scripted enricher where lookup
//! failures need to be simulated.

use herakles_proc_snapshot::{
    Enricher, Filter, ProcError, ProcessDescriptor, ScanOptions, Scanner,
};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const CALLER_UID: u32 = 1000;

/// Builds a stat line with the given identity and neutral remaining fields.
fn stat_record(pid: i32, comm: &str, ppid: i32) -> String {
    format!(
        "{pid} ({comm}) S {ppid} {pid} {pid} 0 -1 4194304 10 0 0 0 5 5 0 0 20 0 1 0 100 \
         2000000 300 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 17 1 0 0 0 0 0 0 0 0 0 0 0 0 0"
    )
}

fn write_stat(root: &Path, pid: i32, content: &str) {
    let dir = root.join(pid.to_string());
    fs::create_dir_all(&dir).expect("Failed to create pid dir");
    fs::write(dir.join("stat"), content).expect("Failed to write stat");
}

/// Enricher answering from fixed tables instead of the kernel.
#[derive(Default)]
struct ScriptedEnricher {
    owners: HashMap<i32, u32>,
    cgroups: HashMap<i32, String>,
    owner_failures: HashSet<i32>,
}

impl ScriptedEnricher {
    fn with(mut self, pid: i32, uid: u32, cgroup: &str) -> Self {
        self.owners.insert(pid, uid);
        self.cgroups.insert(pid, cgroup.to_string());
        self
    }

    fn failing_owner(mut self, pid: i32) -> Self {
        self.owner_failures.insert(pid);
        self
    }
}

fn unavailable(pid: i32, lookup: &'static str) -> ProcError {
    ProcError::EnrichmentUnavailable {
        pid,
        lookup,
        reason: "scripted failure".into(),
    }
}

impl Enricher for ScriptedEnricher {
    fn owner_uid(&self, pid: i32) -> Result<u32, ProcError> {
        if self.owner_failures.contains(&pid) {
            return Err(unavailable(pid, "owner"));
        }
        self.owners
            .get(&pid)
            .copied()
            .ok_or_else(|| unavailable(pid, "owner"))
    }

    fn user_name(&self, pid: i32, uid: u32) -> Result<String, ProcError> {
        match uid {
            0 => Ok("root".into()),
            CALLER_UID => Ok("alice".into()),
            _ => Err(unavailable(pid, "user")),
        }
    }

    fn cgroup(&self, pid: i32) -> Result<String, ProcError> {
        self.cgroups
            .get(&pid)
            .cloned()
            .ok_or_else(|| unavailable(pid, "cgroup"))
    }

    fn oom_score_adj(&self, pid: i32) -> Result<i32, ProcError> {
        Ok(pid % 7)
    }

    fn io_priority(&self, _pid: i32) -> Result<i32, ProcError> {
        // best-effort, level 4
        Ok((2 << 13) | 4)
    }
}

fn user_cgroup(uid: u32) -> String {
    format!("0::/user.slice/user-{uid}.slice/session-1.scope")
}

/// Scripted metadata for pids `1..=count`, alternating between user and
/// system slices.
fn tree_enricher(count: i32) -> ScriptedEnricher {
    (1..=count).fold(ScriptedEnricher::default(), |enricher, pid| match pid % 3 {
        0 => enricher.with(pid, 0, "0::/system.slice/cron.service"),
        1 => enricher.with(pid, CALLER_UID, &user_cgroup(CALLER_UID)),
        _ => enricher.with(pid, 1001, &user_cgroup(1001)),
    })
}

fn populated_tree(count: i32) -> (TempDir, ScriptedEnricher) {
    let dir = tempdir().expect("Failed to create temp dir");
    for pid in 1..=count {
        write_stat(dir.path(), pid, &stat_record(pid, &format!("proc {pid}"), 1));
    }
    (dir, tree_enricher(count))
}

fn pids(procs: &[ProcessDescriptor]) -> Vec<i32> {
    procs.iter().map(|p| p.pid()).collect()
}

#[test]
fn test_scan_returns_sorted_by_pid() {
    let (dir, enricher) = populated_tree(120);
    let procs = Scanner::with_enricher(dir.path(), enricher)
        .workers(8)
        .scan_as(Filter::All, CALLER_UID)
        .expect("scan succeeds");

    assert_eq!(procs.len(), 120);
    assert_eq!(pids(&procs), (1..=120).collect::<Vec<_>>());
}

#[test]
fn test_scan_identical_across_worker_counts() {
    let (dir, _) = populated_tree(200);
    let scan_with = |workers: usize| {
        Scanner::with_enricher(dir.path(), tree_enricher(200))
            .options(ScanOptions {
                workers: Some(workers),
                ..ScanOptions::default()
            })
            .scan_as(Filter::All, CALLER_UID)
            .expect("scan succeeds")
    };

    let single = scan_with(1);
    assert_eq!(single.len(), 200);
    for workers in [2, 4, 16] {
        for _ in 0..3 {
            assert_eq!(scan_with(workers), single, "output differs with {workers} workers");
        }
    }
}

#[test]
fn test_scan_scopes_partition_results() {
    let (dir, enricher) = populated_tree(60);
    let scanner = Scanner::with_enricher(dir.path(), enricher).workers(4);

    let all = scanner.scan_as(Filter::All, CALLER_UID).unwrap();
    let global = scanner.scan_as(Filter::Global, CALLER_UID).unwrap();
    let system = scanner.scan_as(Filter::System, CALLER_UID).unwrap();
    let user = scanner.scan_as(Filter::User, CALLER_UID).unwrap();

    assert_eq!(global.len() + system.len(), all.len());
    let global_pids: HashSet<i32> = pids(&global).into_iter().collect();
    assert!(pids(&system).iter().all(|p| !global_pids.contains(p)));

    assert_eq!(system.len(), 20);
    assert_eq!(global.len(), 40);
    assert_eq!(user.len(), 20);
    assert!(user.iter().all(|p| p.uid() == i64::from(CALLER_UID)));
    assert!(pids(&user).iter().all(|p| global_pids.contains(p)));
}

#[test]
fn test_scan_enrichment_fields() {
    let (dir, enricher) = populated_tree(3);
    let procs = Scanner::with_enricher(dir.path(), enricher)
        .scan_as(Filter::All, CALLER_UID)
        .unwrap();

    let first = &procs[0];
    assert_eq!(first.comm(), "proc 1");
    assert_eq!(first.user(), "alice");
    assert_eq!(first.cgroup().slice, "user.slice");
    assert_eq!(first.cgroup().leaf, "session-1.scope");
    assert_eq!(first.oom_score_adj(), 1);
    assert_eq!(first.io_class_name(), "best-effort");
    assert_eq!(first.io_level(), 4);

    // uid 1001 has no passwd entry in the scripted table
    assert_eq!(procs[1].uid(), 1001);
    assert_eq!(procs[1].user(), "");

    assert_eq!(procs[2].user(), "root");
    assert_eq!(procs[2].cgroup().slice, "system.slice");
}

#[test]
fn test_partial_enrichment_owner_failure() {
    let dir = tempdir().expect("Failed to create temp dir");
    write_stat(dir.path(), 10, &stat_record(10, "orphan", 1));
    write_stat(dir.path(), 11, &stat_record(11, "mine", 1));
    let enricher = ScriptedEnricher::default()
        .with(10, CALLER_UID, &user_cgroup(CALLER_UID))
        .with(11, CALLER_UID, &user_cgroup(CALLER_UID))
        .failing_owner(10);
    let scanner = Scanner::with_enricher(dir.path(), enricher);

    let all = scanner.scan_as(Filter::All, CALLER_UID).unwrap();
    assert_eq!(pids(&all), vec![10, 11]);
    let orphan = &all[0];
    assert_eq!(orphan.uid(), -1);
    assert_eq!(orphan.user(), "");
    // Other lookups still ran
    assert_eq!(orphan.cgroup().slice, "user.slice");
    assert_eq!(orphan.oom_score_adj(), 3);

    let user = scanner.scan_as(Filter::User, CALLER_UID).unwrap();
    assert_eq!(pids(&user), vec![11]);
}

#[test]
fn test_malformed_and_vanished_records_are_dropped() {
    let dir = tempdir().expect("Failed to create temp dir");
    write_stat(dir.path(), 1, &stat_record(1, "init", 0));
    write_stat(dir.path(), 2, "2 (short) S 1 2");
    write_stat(dir.path(), 3, "garbage without parentheses");
    // Process exited after its directory was listed
    fs::create_dir(dir.path().join("4")).unwrap();
    write_stat(dir.path(), 5, &format!("{}\n", stat_record(5, "tail", 1)));
    fs::create_dir(dir.path().join("self")).unwrap();

    let enricher = ScriptedEnricher::default()
        .with(1, 0, "0::/init.scope")
        .with(5, 0, "0::/");
    let procs = Scanner::with_enricher(dir.path(), enricher)
        .workers(2)
        .scan_as(Filter::All, CALLER_UID)
        .expect("per-record failures never abort the scan");

    assert_eq!(pids(&procs), vec![1, 5]);
    assert_eq!(procs[1].cgroup().path, "0::/");
    assert_eq!(procs[1].cgroup().slice, "");
}

#[test]
fn test_embedded_parentheses_survive_scan() {
    let dir = tempdir().expect("Failed to create temp dir");
    write_stat(dir.path(), 7, &stat_record(7, "my proc (v2)", 1));
    let procs = Scanner::with_enricher(dir.path(), ScriptedEnricher::default())
        .scan_as(Filter::All, CALLER_UID)
        .unwrap();
    assert_eq!(procs[0].comm(), "my proc (v2)");
    // Unresolved cgroup means "not in the user slice"
    assert!(procs[0].in_system_slice());
}

#[test]
fn test_non_utf8_command_name_is_kept() {
    let dir = tempdir().expect("Failed to create temp dir");
    write_stat(dir.path(), 10, &stat_record(10, "ok", 1));
    let mut raw = stat_record(11, "b?d", 1).into_bytes();
    let pos = raw.iter().position(|b| *b == b'?').expect("placeholder present");
    raw[pos] = 0xff;
    fs::create_dir_all(dir.path().join("11")).unwrap();
    fs::write(dir.path().join("11").join("stat"), raw).unwrap();

    let procs = Scanner::new(dir.path())
        .workers(2)
        .scan(Filter::All)
        .expect("scan succeeds");

    assert_eq!(pids(&procs), vec![10, 11]);
    assert_eq!(procs[1].comm(), "b\u{fffd}d");
}

#[test]
fn test_missing_root_is_discovery_failure() {
    let dir = tempdir().expect("Failed to create temp dir");
    let result = Scanner::new(dir.path().join("missing")).scan(Filter::All);
    assert!(matches!(result, Err(ProcError::DiscoveryFailed { .. })));
}

#[test]
fn test_empty_root_yields_empty_snapshot() {
    let dir = tempdir().expect("Failed to create temp dir");
    let procs = Scanner::new(dir.path()).scan(Filter::All).expect("scan succeeds");
    assert!(procs.is_empty());
}

#[test]
fn test_cancelled_scan_returns_early() {
    let (dir, enricher) = populated_tree(50);
    let scanner = Scanner::with_enricher(dir.path(), enricher).workers(4);
    scanner.cancel_flag().cancel();

    let procs = scanner.scan_as(Filter::All, CALLER_UID).expect("cancelled scan is not an error");
    assert!(procs.is_empty());
}

#[test]
fn test_procfs_enricher_on_synthetic_tree() {
    // pids above the kernel's pid_max so ioprio_get never hits a real process
    let base = 5_000_000;
    let dir = tempdir().expect("Failed to create temp dir");
    for offset in 1..=4 {
        let pid = base + offset;
        write_stat(dir.path(), pid, &stat_record(pid, "synthetic", base));
        let cgroup = if offset % 2 == 0 {
            "0::/system.slice/synthetic.service\n".to_string()
        } else {
            format!("{}\n", user_cgroup(CALLER_UID))
        };
        fs::write(dir.path().join(pid.to_string()).join("cgroup"), cgroup).unwrap();
        fs::write(dir.path().join(pid.to_string()).join("oom_score_adj"), "200\n").unwrap();
    }

    let me = nix::unistd::geteuid().as_raw();
    let scanner = Scanner::new(dir.path());

    let all = scanner.scan_as(Filter::All, me).unwrap();
    assert_eq!(pids(&all), vec![base + 1, base + 2, base + 3, base + 4]);
    assert!(all.iter().all(|p| p.uid() == i64::from(me)));
    assert!(all.iter().all(|p| p.oom_score_adj() == 200));
    assert!(all.iter().all(|p| (p.io_class(), p.io_level()) == (0, 0)));

    let user = scanner.scan_as(Filter::User, me).unwrap();
    assert_eq!(pids(&user), vec![base + 1, base + 3]);

    let system = scanner.scan_as(Filter::System, me).unwrap();
    assert_eq!(pids(&system), vec![base + 2, base + 4]);
    assert_eq!(system[0].cgroup().leaf, "synthetic.service");
}
