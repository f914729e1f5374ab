use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};

/// Prefix of the statement-duration messages counted as slow events.
pub const SLOW_MESSAGE_PREFIX: &str = "duration: ";

/// Returns true if the log message reports a statement duration.
pub fn is_slow_message(message: &str) -> bool {
    message.starts_with(SLOW_MESSAGE_PREFIX)
}

/// Counts slow-statement messages since the last reset.
///
/// Independent of the event ring: the count is exact and never windowed.
pub struct SlowEventCounter {
    count: AtomicU64,
    /// Reset time as microseconds since the Unix epoch.
    reset_at_us: AtomicI64,
}

/// Point-in-time view of the slow counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SlowEventSnapshot {
    pub count: u64,
    pub reset_at: DateTime<Utc>,
}

impl SlowEventCounter {
    /// Creates a zeroed counter stamped with the current time.
    pub fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            reset_at_us: AtomicI64::new(Utc::now().timestamp_micros()),
        }
    }

    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Zero the count and stamp the reset time.
    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
        self.reset_at_us
            .store(Utc::now().timestamp_micros(), Ordering::Relaxed);
    }

    pub fn read(&self) -> SlowEventSnapshot {
        let us = self.reset_at_us.load(Ordering::Relaxed);
        SlowEventSnapshot {
            count: self.count.load(Ordering::Relaxed),
            reset_at: DateTime::from_timestamp_micros(us).unwrap_or_default(),
        }
    }
}

impl Default for SlowEventCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_and_read() {
        let counter = SlowEventCounter::new();
        counter.increment();
        counter.increment();
        assert_eq!(counter.read().count, 2);
    }

    #[test]
    fn test_reset_zeroes_and_advances_timestamp() {
        let counter = SlowEventCounter::new();
        let before = counter.read().reset_at;
        counter.increment();

        std::thread::sleep(std::time::Duration::from_millis(2));
        counter.reset();

        let snap = counter.read();
        assert_eq!(snap.count, 0);
        assert!(snap.reset_at > before, "reset_at should move forward");
    }

    #[test]
    fn test_is_slow_message() {
        assert!(is_slow_message("duration: 1203.117 ms  statement: select 1"));
        assert!(!is_slow_message("relation \"foo\" does not exist"));
        assert!(!is_slow_message("  duration: 3 ms"));
    }
}
