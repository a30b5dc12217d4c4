use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossbeam::channel::{unbounded, Receiver};
use indicatif::ProgressBar;
use rusqlite::Connection;
use tracing::{error, info, warn};

use crate::database::repo::{open_database, ExistingIds, TransactionManager};
use crate::ingest::classifier::{classify_directory, DirOutcome};
use crate::ingest::scanner::{self, DirTask};
use crate::ingest::state::{ScanScheduler, ScanTicket};

const MAX_WORKERS: usize = 32;
const DEFAULT_PARALLELISM: usize = 4;

/// Per-family counts of records created by one pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub works: usize,
    pub posts: usize,
    pub unclassified: usize,
    pub skipped: usize,
    pub failed_tasks: usize,
    pub removed: usize,
}

impl ScanSummary {
    pub fn progress_message(&self) -> String {
        format!("Artwork:{} Post:{} Unclassified:{}", self.works, self.posts, self.unclassified)
    }

    pub fn final_message(&self) -> String {
        format!(
            "Complete: A{} / P{} / U{} (removed {})",
            self.works, self.posts, self.unclassified, self.removed
        )
    }
}

/// Classification applied to each directory task.
type Classifier = fn(&DirTask, &ExistingIds) -> DirOutcome;

struct TaskResult {
    dir: PathBuf,
    outcome: std::result::Result<DirOutcome, String>,
}

pub fn worker_count() -> usize {
    let parallelism = thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(DEFAULT_PARALLELISM);
    (parallelism * 2).min(MAX_WORKERS)
}

/// Runs a full pass on the calling thread. Returns `None` without doing
/// anything when another pass holds the scheduler.
pub fn run_scan(
    scheduler: &ScanScheduler,
    root: &Path,
    db_path: &Path,
    progress: &ProgressBar,
) -> Option<Result<ScanSummary>> {
    let ticket = scheduler.try_start(format!("Scanning {}", root.display()))?;
    Some(execute(ticket, root, db_path, progress, classify_directory))
}

/// Starts a pass on its own thread so request handling is not blocked.
pub fn spawn_scan(scheduler: &ScanScheduler, root: PathBuf, db_path: PathBuf) -> Option<JoinHandle<()>> {
    let Some(ticket) = scheduler.try_start(format!("Scanning {}", root.display())) else {
        info!("Scan already running, ignoring request for {:?}", root);
        return None;
    };

    let spawned = thread::Builder::new()
        .name("scan".to_string())
        .spawn(move || {
            let _ = execute(ticket, &root, &db_path, &ProgressBar::hidden(), classify_directory);
        });

    match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            error!("Failed to spawn scan thread: {}", e);
            None
        }
    }
}

fn execute(
    ticket: ScanTicket,
    root: &Path,
    db_path: &Path,
    progress: &ProgressBar,
    classify: Classifier,
) -> Result<ScanSummary> {
    info!("=== SCAN START: {:?} ===", root);

    let result = open_database(db_path)
        .and_then(|mut conn| scan_pass(&ticket, root, &mut conn, progress, classify));

    match &result {
        Ok(summary) => {
            info!("=== COMPLETE: {} ===", summary.final_message());
            ticket.finish(summary.final_message());
        }
        Err(e) => {
            error!("Scan failed: {:#}", e);
            ticket.fail(format!("Error: {:#}", e));
        }
    }
    result
}

fn scan_pass(
    ticket: &ScanTicket,
    root: &Path,
    conn: &mut Connection,
    progress: &ProgressBar,
    classify: Classifier,
) -> Result<ScanSummary> {
    let existing = Arc::new(ExistingIds::load(conn)?);
    let tasks = scanner::scan_directory(root)?;

    info!("{} folders to classify", tasks.len());
    ticket.progress(format!("{} folders...", tasks.len()));
    progress.set_length(tasks.len() as u64);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(worker_count())
        .thread_name(|i| format!("classifier-{}", i))
        .build()
        .context("Failed to build classifier pool")?;

    let cancelled = Arc::new(AtomicBool::new(false));
    let (tx, rx) = unbounded::<TaskResult>();
    for task in tasks {
        let tx = tx.clone();
        let existing = Arc::clone(&existing);
        let cancelled = Arc::clone(&cancelled);
        pool.spawn(move || {
            if cancelled.load(Ordering::Relaxed) {
                return;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| classify(&task, &existing)))
                .map_err(panic_message);
            let _ = tx.send(TaskResult { dir: task.dir, outcome });
        });
    }
    // Drop the original tx so the receiver closes when every task has reported
    drop(tx);

    let mut tm = TransactionManager::new(conn);
    let written = write_results(&rx, &mut tm, ticket, progress);
    if written.is_err() {
        // Stop queued tasks and wait out running ones before reporting.
        cancelled.store(true, Ordering::Relaxed);
        rx.iter().for_each(drop);
    }
    let mut summary = written?;

    info!("Cleaning up duplicates...");
    summary.removed = tm.finish()?;
    progress.finish_and_clear();
    Ok(summary)
}

fn write_results(
    rx: &Receiver<TaskResult>,
    tm: &mut TransactionManager<'_>,
    ticket: &ScanTicket,
    progress: &ProgressBar,
) -> Result<ScanSummary> {
    let mut summary = ScanSummary::default();

    for result in rx {
        progress.inc(1);
        let outcome = match result.outcome {
            Ok(outcome) => outcome,
            Err(reason) => {
                warn!("Task error in {:?}: {}", result.dir, reason);
                summary.failed_tasks += 1;
                continue;
            }
        };

        for skipped in &outcome.skipped {
            warn!("Skipped {:?}: {}", skipped.path, skipped.reason);
        }
        summary.skipped += outcome.skipped.len();

        for post in outcome.posts {
            tm.add_post(post)?;
            summary.posts += 1;
        }
        for bucket in outcome.works {
            tm.add_work(bucket.finalize())?;
            summary.works += 1;
        }
        for record in outcome.unclassified {
            tm.add_unclassified(record)?;
            summary.unclassified += 1;
        }

        ticket.progress(summary.progress_message());
    }

    Ok(summary)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
