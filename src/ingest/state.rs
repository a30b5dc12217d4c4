//! Process-wide scan state.
//!
//! At most one scan pass runs at a time. Callers obtain a [`ScanTicket`] from
//! [`ScanScheduler::try_start`]; holding the ticket is the only way to report
//! progress or end the pass. Dropping a ticket without finishing it marks the
//! pass as failed, so a panicking scan can never leave the state stuck in
//! `Running`.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Running,
    Failed,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScanStatus {
    pub is_scanning: bool,
    pub message: String,
}

#[derive(Debug)]
struct Inner {
    phase: ScanPhase,
    message: String,
}

#[derive(Debug, Clone)]
pub struct ScanScheduler {
    inner: Arc<Mutex<Inner>>,
}

impl Default for ScanScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanScheduler {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner { phase: ScanPhase::Idle, message: String::new() })),
        }
    }

    /// Moves `Idle | Failed -> Running`. Returns `None` when a pass is
    /// already running.
    pub fn try_start(&self, message: impl Into<String>) -> Option<ScanTicket> {
        let mut inner = self.lock();
        if inner.phase == ScanPhase::Running {
            return None;
        }
        inner.phase = ScanPhase::Running;
        inner.message = message.into();
        Some(ScanTicket { scheduler: self.clone(), done: false })
    }

    pub fn phase(&self) -> ScanPhase {
        self.lock().phase.clone()
    }

    pub fn status(&self) -> ScanStatus {
        let inner = self.lock();
        ScanStatus {
            is_scanning: inner.phase == ScanPhase::Running,
            message: inner.message.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Proof that the holder owns the running scan pass.
#[derive(Debug)]
pub struct ScanTicket {
    scheduler: ScanScheduler,
    done: bool,
}

impl ScanTicket {
    pub fn progress(&self, message: impl Into<String>) {
        self.scheduler.lock().message = message.into();
    }

    /// `Running -> Idle`.
    pub fn finish(mut self, message: impl Into<String>) {
        self.end(ScanPhase::Idle, message.into());
    }

    /// `Running -> Failed`.
    pub fn fail(mut self, message: impl Into<String>) {
        self.end(ScanPhase::Failed, message.into());
    }

    fn end(&mut self, phase: ScanPhase, message: String) {
        let mut inner = self.scheduler.lock();
        inner.phase = phase;
        inner.message = message;
        self.done = true;
    }
}

impl Drop for ScanTicket {
    fn drop(&mut self) {
        if !self.done {
            warn!("Scan ended without reporting a result");
            self.end(ScanPhase::Failed, "Error: scan aborted".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_flight() {
        let scheduler = ScanScheduler::new();
        let ticket = scheduler.try_start("starting").unwrap();
        assert!(scheduler.try_start("again").is_none());
        assert_eq!(scheduler.status(), ScanStatus { is_scanning: true, message: "starting".into() });

        ticket.progress("Artwork:1 Post:0 Unclassified:0");
        assert_eq!(scheduler.status().message, "Artwork:1 Post:0 Unclassified:0");

        ticket.finish("done");
        assert_eq!(scheduler.phase(), ScanPhase::Idle);
        assert!(!scheduler.status().is_scanning);
        assert!(scheduler.try_start("next").is_some());
    }

    #[test]
    fn test_failure_releases_the_flag() {
        let scheduler = ScanScheduler::new();
        scheduler.try_start("starting").unwrap().fail("Error: disk full");
        assert_eq!(scheduler.phase(), ScanPhase::Failed);
        assert_eq!(scheduler.status().message, "Error: disk full");
        assert!(scheduler.try_start("retry").is_some());
    }

    #[test]
    fn test_dropped_ticket_marks_failed() {
        let scheduler = ScanScheduler::new();
        {
            let _ticket = scheduler.try_start("starting").unwrap();
        }
        assert_eq!(scheduler.phase(), ScanPhase::Failed);
        assert!(!scheduler.status().is_scanning);
    }
}
