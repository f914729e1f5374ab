pub mod slot;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::event::Event;

use self::slot::Slot;

/// Extra intervals kept beyond the retained window so a reader scanning the
/// oldest retained interval is not overtaken by the rotator clearing it.
pub const SAFETY_INTERVALS: usize = 5;

/// Shape of the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingGeometry {
    /// Number of intervals visible to readers.
    pub intervals_count: usize,
    /// Slots per interval.
    pub messages_per_interval: usize,
}

impl RingGeometry {
    /// Total number of intervals allocated, including the safety margin.
    pub const fn actual_intervals_count(&self) -> usize {
        self.intervals_count + SAFETY_INTERVALS
    }

    pub const fn capacity(&self) -> usize {
        self.actual_intervals_count() * self.messages_per_interval
    }
}

/// Fixed-capacity circular store of events partitioned into intervals.
///
/// Producers claim a slot in the current interval with a single fetch-add.
/// When an interval fills up the counter wraps and newer events overwrite
/// older ones of the same interval.
pub struct EventRing {
    geometry: RingGeometry,
    slots: Box<[Slot]>,
    /// Index of the interval producers write into.
    current: AtomicUsize,
    /// Next write position inside the current interval, before the modulo.
    position: AtomicUsize,
    /// Non-empty slots overwritten since the last reset.
    overwritten: AtomicU64,
}

impl EventRing {
    /// Allocates a ring with every slot empty.
    pub fn new(geometry: RingGeometry) -> Self {
        let slots = (0..geometry.capacity()).map(|_| Slot::empty()).collect();
        Self {
            geometry,
            slots,
            current: AtomicUsize::new(0),
            position: AtomicUsize::new(0),
            overwritten: AtomicU64::new(0),
        }
    }

    pub fn geometry(&self) -> RingGeometry {
        self.geometry
    }

    /// Stores an event in the current interval. Never blocks or allocates.
    #[inline]
    pub fn record(&self, event: &Event) {
        let mpi = self.geometry.messages_per_interval;
        let interval = self.current.load(Ordering::Acquire);
        let pos = self.position.fetch_add(1, Ordering::Relaxed) % mpi;
        if self.slots[interval * mpi + pos].store(event) {
            self.overwritten.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Moves producers to the next interval and returns its index.
    ///
    /// The next interval is cleared and the position reset before the new
    /// index is published. Only one caller may rotate at a time.
    pub fn advance(&self) -> usize {
        let actual = self.geometry.actual_intervals_count();
        let next = (self.current.load(Ordering::Relaxed) + 1) % actual;
        self.clear_interval(next);
        self.position.store(0, Ordering::Relaxed);
        self.current.store(next, Ordering::Release);
        next
    }

    /// Empties every slot of one interval.
    pub fn clear_interval(&self, interval: usize) {
        for slot in self.interval_slots(interval) {
            slot.clear();
        }
    }

    /// Visits every stored event of the `window` intervals preceding the
    /// current one, oldest interval first.
    ///
    /// The current interval is still being written and is not visited.
    pub fn scan<F>(&self, window: usize, mut visit: F)
    where
        F: FnMut(Event),
    {
        let actual = self.geometry.actual_intervals_count();
        let pivot = self.current.load(Ordering::Acquire);
        for back in (1..=window.min(actual - 1)).rev() {
            let interval = (pivot + actual - back) % actual;
            for slot in self.interval_slots(interval) {
                if let Some(event) = slot.load() {
                    visit(event);
                }
            }
        }
    }

    /// Empties the whole ring and zeroes the overwrite count.
    ///
    /// The current interval index is kept so a concurrent rotation stays
    /// consistent.
    pub fn clear(&self) {
        for slot in self.slots.iter() {
            slot.clear();
        }
        self.position.store(0, Ordering::Relaxed);
        self.overwritten.store(0, Ordering::Relaxed);
    }

    pub fn current_index(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    pub fn overwritten(&self) -> u64 {
        self.overwritten.load(Ordering::Relaxed)
    }

    /// Number of occupied slots in one interval.
    #[cfg(test)]
    pub fn occupied(&self, interval: usize) -> usize {
        self.interval_slots(interval)
            .iter()
            .filter(|s| !s.is_empty())
            .count()
    }

    fn interval_slots(&self, interval: usize) -> &[Slot] {
        let mpi = self.geometry.messages_per_interval;
        let start = interval * mpi;
        &self.slots[start..start + mpi]
    }
}
