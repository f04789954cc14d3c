use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::report::FatalReport;

/// Capacity of the process-wide [`FATAL_LOG`].
pub const DEFAULT_FATAL_LOG_CAPACITY: usize = 256;

/// Bounded in-memory record of observed fatal reports
pub struct FatalLog {
    records: Mutex<VecDeque<FatalReport>>,
    max_entries: usize,
}

impl FatalLog {
    /// A capacity of zero is raised to one.
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(max_entries)),
            max_entries,
        }
    }

    /// Record a report, evicting the oldest one when full.
    pub fn record(&self, report: FatalReport) {
        debug!(
            unit = %report.unit,
            fingerprint = %report.fingerprint,
            "recording fatal report"
        );
        let mut records = self.lock();
        if records.len() == self.max_entries {
            records.pop_front();
        }
        records.push_back(report);
    }

    /// Up to `count` reports, newest first.
    pub fn recent(&self, count: usize) -> Vec<FatalReport> {
        self.lock().iter().rev().take(count).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    // A panic while holding the lock cannot leave the deque half-updated.
    fn lock(&self) -> MutexGuard<'_, VecDeque<FatalReport>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Global fatal log used by the top-level handlers in [`crate::report`].
pub static FATAL_LOG: Lazy<FatalLog> = Lazy::new(|| FatalLog::new(DEFAULT_FATAL_LOG_CAPACITY));
