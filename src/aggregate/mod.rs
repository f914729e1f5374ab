pub mod dimension;

use std::collections::HashMap;

use crate::catalog::ErrorCatalog;
use crate::error::EngineError;
use crate::ring::EventRing;

pub use self::dimension::{GroupKey, GroupedRow};

/// The two canonical report windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// The most recently completed interval.
    Short,
    /// Every retained interval.
    Long,
}

impl Window {
    /// Number of intervals the window spans.
    pub const fn intervals(self, intervals_count: usize) -> usize {
        match self {
            Self::Short => 1,
            Self::Long => intervals_count,
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::Short, Self::Long]
    }
}

/// Read-time aggregation over a contiguous range of ring intervals.
pub struct WindowAggregator<'a> {
    ring: &'a EventRing,
    catalog: &'a ErrorCatalog,
}

impl<'a> WindowAggregator<'a> {
    pub fn new(ring: &'a EventRing, catalog: &'a ErrorCatalog) -> Self {
        Self { ring, catalog }
    }

    /// Groups the events of the last `window` completed intervals.
    ///
    /// Rows are ordered by severity, then count descending, then code, db and
    /// user so the output is deterministic.
    pub fn collect(&self, window: usize) -> Result<Vec<GroupedRow>, EngineError> {
        let max = self.ring.geometry().intervals_count;
        if window == 0 || window > max {
            return Err(EngineError::InvalidWindow { window, max });
        }

        let mut counts: HashMap<GroupKey, u64> = HashMap::new();
        self.ring.scan(window, |event| {
            *counts.entry(GroupKey::from(event)).or_default() += 1;
        });

        let mut rows: Vec<GroupedRow> = counts
            .into_iter()
            .map(|(key, count)| GroupedRow {
                key,
                name: self.catalog.lookup(key.error_code).name,
                count,
            })
            .collect();
        sort_rows(&mut rows);
        Ok(rows)
    }
}

/// Sorts rows into report order.
pub fn sort_rows(rows: &mut [GroupedRow]) {
    rows.sort_unstable_by(|a, b| {
        a.key
            .severity
            .cmp(&b.key.severity)
            .then_with(|| b.count.cmp(&a.count))
            .then_with(|| a.key.error_code.cmp(&b.key.error_code))
            .then_with(|| a.key.db_id.cmp(&b.key.db_id))
            .then_with(|| a.key.user_id.cmp(&b.key.user_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{sqlstate, NOT_KNOWN_ERROR};
    use crate::event::{Event, Severity};
    use crate::ring::RingGeometry;

    fn ring() -> EventRing {
        EventRing::new(RingGeometry {
            intervals_count: 3,
            messages_per_interval: 16,
        })
    }

    fn event(state: &str, db_id: u32, severity: Severity) -> Event {
        Event {
            error_code: sqlstate::parse(state).expect("valid"),
            db_id,
            user_id: 1,
            severity,
        }
    }

    #[test]
    fn test_rejects_out_of_range_window() {
        let ring = ring();
        let agg = WindowAggregator::new(&ring, ErrorCatalog::global());
        assert_eq!(
            agg.collect(0),
            Err(EngineError::InvalidWindow { window: 0, max: 3 })
        );
        assert_eq!(
            agg.collect(4),
            Err(EngineError::InvalidWindow { window: 4, max: 3 })
        );
        assert!(agg.collect(3).is_ok());
    }

    #[test]
    fn test_groups_and_names_rows() {
        let ring = ring();
        for _ in 0..3 {
            ring.record(&event("42P01", 1, Severity::Error));
        }
        ring.record(&event("42P01", 2, Severity::Error));
        ring.record(&event("ZZ999", 1, Severity::Fatal));
        ring.record(&event("01000", 1, Severity::Warning));
        ring.advance();

        let agg = WindowAggregator::new(&ring, ErrorCatalog::global());
        let rows = agg.collect(1).expect("collect");
        assert_eq!(rows.len(), 4);

        assert_eq!(rows[0].key.severity, Severity::Warning);
        assert_eq!(rows[0].name, "warning");

        assert_eq!(rows[1].name, "undefined_table");
        assert_eq!(rows[1].count, 3);
        assert_eq!(rows[1].key.db_id, 1);
        assert_eq!(rows[2].count, 1);
        assert_eq!(rows[2].key.db_id, 2);

        assert_eq!(rows[3].key.severity, Severity::Fatal);
        assert_eq!(rows[3].name, NOT_KNOWN_ERROR);
    }

    #[test]
    fn test_window_spans_multiple_intervals() {
        let ring = ring();
        ring.record(&event("23505", 1, Severity::Error));
        ring.advance();
        ring.record(&event("23505", 1, Severity::Error));
        ring.advance();

        let agg = WindowAggregator::new(&ring, ErrorCatalog::global());
        assert_eq!(agg.collect(1).expect("short")[0].count, 1);
        assert_eq!(agg.collect(2).expect("long")[0].count, 2);
    }

    #[test]
    fn test_window_intervals() {
        assert_eq!(Window::Short.intervals(120), 1);
        assert_eq!(Window::Long.intervals(120), 120);
    }
}
