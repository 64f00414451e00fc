//! Live progress and per-class counters for a batch run.
//!
//! Workers share one [`BatchProgress`] through an `Arc`. Counters are atomics;
//! the progress callback runs under a mutex so printed lines never interleave.

use crate::types::{Availability, CheckResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// One completed check, as seen by a progress callback.
#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent<'a> {
    /// 1-based position in completion order
    pub current: usize,
    pub total: usize,
    pub domain: &'a str,
    pub availability: Availability,
}

/// Callback invoked once per completed domain.
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent<'_>) + Send + Sync>;

/// Per-class counters for a batch (thread-safe).
#[derive(Debug)]
pub struct CheckStats {
    available: AtomicUsize,
    taken: AtomicUsize,
    errors: AtomicUsize,
    started: Instant,
}

/// Point-in-time copy of [`CheckStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub available: usize,
    pub taken: usize,
    pub errors: usize,
}

impl StatsSnapshot {
    pub fn total(&self) -> usize {
        self.available + self.taken + self.errors
    }
}

impl CheckStats {
    pub fn new() -> Self {
        Self {
            available: AtomicUsize::new(0),
            taken: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            started: Instant::now(),
        }
    }

    pub fn record(&self, availability: Availability) {
        let counter = match availability {
            Availability::NoMatch => &self.available,
            Availability::Taken => &self.taken,
            Availability::Error => &self.errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            available: self.available.load(Ordering::Relaxed),
            taken: self.taken.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for CheckStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared progress state for one batch.
pub struct BatchProgress {
    total: usize,
    processed: AtomicUsize,
    stats: CheckStats,
    print_lock: Mutex<()>,
    callback: Option<ProgressCallback>,
}

impl BatchProgress {
    /// Silent progress tracking for `total` domains.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: AtomicUsize::new(0),
            stats: CheckStats::new(),
            print_lock: Mutex::new(()),
            callback: None,
        }
    }

    /// Progress tracking that reports each completion to `callback`.
    pub fn with_callback(total: usize, callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            ..Self::new(total)
        }
    }

    /// Count a finished check and report it. Returns the updated processed count.
    pub fn record(&self, result: &CheckResult) -> usize {
        let current = self.processed.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.record(result.availability);

        if let Some(callback) = &self.callback {
            let _guard = self.print_lock.lock().unwrap_or_else(PoisonError::into_inner);
            callback(&ProgressEvent {
                current,
                total: self.total,
                domain: &result.domain,
                availability: result.availability,
            });
        }

        current
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn stats(&self) -> &CheckStats {
        &self.stats
    }
}

impl std::fmt::Debug for BatchProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchProgress")
            .field("total", &self.total)
            .field("processed", &self.processed())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}
