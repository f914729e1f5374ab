use std::sync::atomic::{AtomicU64, Ordering};

use super::{Severity, SEVERITY_COUNT};

/// Lock-free cumulative per-severity counters.
///
/// Unlike a windowed view these are exact: every recorded event is counted,
/// including the ones later overwritten in the ring.
pub struct SeverityTotals {
    counts: [AtomicU64; SEVERITY_COUNT],
}

impl SeverityTotals {
    /// Create a new zeroed counter set.
    pub fn new() -> Self {
        Self {
            counts: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Increment the counter for the given severity by one.
    pub fn record(&self, severity: Severity) {
        self.counts[severity.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time read of all counters, indexed by severity.
    pub fn snapshot(&self) -> [u64; SEVERITY_COUNT] {
        std::array::from_fn(|i| self.counts[i].load(Ordering::Relaxed))
    }

    /// Zero all counters.
    pub fn reset(&self) {
        for counter in &self.counts {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for SeverityTotals {
    fn default() -> Self {
        Self::new()
    }
}
