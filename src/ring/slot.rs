use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU8, Ordering};

use crate::event::{Event, Severity};

/// Error code marking a slot that holds no event.
pub const EMPTY_CODE: i32 = -1;

/// One event position in the ring.
///
/// Every field is its own relaxed atomic. A reader racing a writer may see
/// fields from two different events; the aggregation tolerates that.
pub struct Slot {
    error_code: AtomicI32,
    db_id: AtomicU32,
    user_id: AtomicU32,
    severity: AtomicU8,
}

impl Slot {
    pub const fn empty() -> Self {
        Self {
            error_code: AtomicI32::new(EMPTY_CODE),
            db_id: AtomicU32::new(0),
            user_id: AtomicU32::new(0),
            severity: AtomicU8::new(0),
        }
    }

    /// Writes an event into the slot.
    ///
    /// Returns true if a previous event was overwritten.
    #[inline]
    pub fn store(&self, event: &Event) -> bool {
        self.db_id.store(event.db_id, Ordering::Relaxed);
        self.user_id.store(event.user_id, Ordering::Relaxed);
        self.severity
            .store(event.severity as u8, Ordering::Relaxed);
        self.error_code.swap(event.error_code, Ordering::Relaxed) != EMPTY_CODE
    }

    /// Reads the slot, returning None when it is empty.
    #[inline]
    pub fn load(&self) -> Option<Event> {
        let error_code = self.error_code.load(Ordering::Relaxed);
        if error_code == EMPTY_CODE {
            return None;
        }
        let severity = Severity::from_u8(self.severity.load(Ordering::Relaxed))?;
        Some(Event {
            error_code,
            db_id: self.db_id.load(Ordering::Relaxed),
            user_id: self.user_id.load(Ordering::Relaxed),
            severity,
        })
    }

    pub fn clear(&self) {
        self.error_code.store(EMPTY_CODE, Ordering::Relaxed);
        self.db_id.store(0, Ordering::Relaxed);
        self.user_id.store(0, Ordering::Relaxed);
        self.severity.store(0, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.error_code.load(Ordering::Relaxed) == EMPTY_CODE
    }
}

impl Default for Slot {
    fn default() -> Self {
        Self::empty()
    }
}
