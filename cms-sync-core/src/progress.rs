//! Progress accounting for one import run.
//!
//! In-memory only: counters live for the duration of a run and are discarded
//! afterwards. The invoking surface (CLI progress bar, admin UI) polls
//! [`ImportProgress::snapshot`] after each post completes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Shared counters for a run. Updated after each post completes, success or
/// failure.
pub struct ImportProgress {
    total: usize,
    processed: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    /// Identifying labels (slug or title) of failed posts, for the summary.
    failed_labels: Mutex<Vec<String>>,
}

/// Point-in-time view of a run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failed_labels: Vec<String>,
}

impl ProgressSnapshot {
    /// Completion percentage for rendering; 100 when the run was empty.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            100
        } else {
            ((self.processed * 100) / self.total) as u8
        }
    }
}

impl ImportProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: AtomicUsize::new(0),
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            failed_labels: Mutex::new(Vec::new()),
        }
    }

    pub fn record_success(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, label: &str) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
        let mut labels = self
            .failed_labels
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        labels.push(label.to_string());
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let failed_labels = self
            .failed_labels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        ProgressSnapshot {
            total: self.total,
            processed: self.processed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            failed_labels,
        }
    }

    /// Final human-readable summary: counts plus the failed labels.
    pub fn summary(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = format!(
            "{} of {} posts imported, {} failed",
            snapshot.succeeded, snapshot.total, snapshot.failed
        );
        if !snapshot.failed_labels.is_empty() {
            out.push_str(": ");
            out.push_str(&snapshot.failed_labels.join(", "));
        }
        out
    }
}
