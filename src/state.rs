use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use tracing::{debug, info};

use crate::aggregate::{GroupedRow, Window, WindowAggregator};
use crate::catalog::{ErrorCatalog, ExclusionSet};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::event::slow::{SlowEventCounter, SlowEventSnapshot};
use crate::event::stats::SeverityTotals;
use crate::event::{Event, Severity, SEVERITY_COUNT};
use crate::ring::slot::EMPTY_CODE;
use crate::ring::{EventRing, RingGeometry};

/// Process-wide control block shared by producers, the rotator and readers.
pub struct GlobalState {
    /// Configuration the ring was built from.
    config: EngineConfig,
    ring: EventRing,
    totals: SeverityTotals,
    excluded: ArcSwap<ExclusionSet>,
    excluded_events: AtomicU64,
    slow: SlowEventCounter,
    rotations: AtomicU64,
}

/// Point-in-time counters for self-metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    pub totals: [u64; SEVERITY_COUNT],
    pub excluded_events: u64,
    pub rotations: u64,
    pub overwritten: u64,
    pub slow_events: u64,
    pub current_interval: usize,
}

impl GlobalState {
    fn new(cfg: &EngineConfig) -> Self {
        Self {
            config: cfg.clone(),
            ring: EventRing::new(cfg.geometry()),
            totals: SeverityTotals::new(),
            excluded: ArcSwap::from_pointee(ExclusionSet::from_codes(&cfg.excluded_codes)),
            excluded_events: AtomicU64::new(0),
            slow: SlowEventCounter::new(),
            rotations: AtomicU64::new(0),
        }
    }

    #[inline]
    fn record(&self, event: &Event) {
        // The slot sentinel is not a recordable code.
        if event.error_code == EMPTY_CODE {
            return;
        }
        if self.excluded.load().contains(event.error_code) {
            self.excluded_events.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.ring.record(event);
        self.totals.record(event.severity);
    }

    fn reset(&self) {
        self.ring.clear();
        self.totals.reset();
        self.excluded_events.store(0, Ordering::Relaxed);
        self.slow.reset();
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn geometry(&self) -> RingGeometry {
        self.ring.geometry()
    }

    fn stats(&self) -> EngineStats {
        EngineStats {
            totals: self.totals.snapshot(),
            excluded_events: self.excluded_events.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            overwritten: self.ring.overwritten(),
            slow_events: self.slow.read().count,
            current_interval: self.ring.current_index(),
        }
    }
}

/// Outcome of applying a new engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconfigured {
    /// The engine was not running and has been initialized.
    Initialized,
    /// Only the exclusion set changed and was swapped in place.
    ExclusionsUpdated,
    /// Ring geometry or interval changed; the state was rebuilt empty.
    Rebuilt,
}

/// Handle to the engine state.
///
/// Uninitialized while no state is attached. Producers load the state without
/// locking and drop events while it is absent.
pub struct Engine {
    state: ArcSwapOption<GlobalState>,
}

impl Engine {
    /// Creates an uninitialized engine.
    pub fn new() -> Self {
        Self {
            state: ArcSwapOption::empty(),
        }
    }

    /// Allocates fresh state from the configuration, replacing any existing
    /// state.
    pub fn initialize(&self, cfg: &EngineConfig) -> Result<(), EngineError> {
        cfg.validate()?;
        let state = GlobalState::new(cfg);
        info!(
            interval_ms = cfg.interval.as_millis() as u64,
            intervals_count = cfg.intervals_count,
            messages_per_interval = cfg.messages_per_interval,
            excluded = state.excluded.load().len(),
            "engine initialized",
        );
        self.state.store(Some(Arc::new(state)));
        Ok(())
    }

    /// Applies a configuration to a running engine.
    ///
    /// Exclusion changes are swapped in place. A changed interval or ring
    /// geometry discards the stored events and rebuilds the state.
    pub fn configure(&self, cfg: &EngineConfig) -> Result<Reconfigured, EngineError> {
        cfg.validate()?;
        let Some(state) = self.state.load_full() else {
            self.initialize(cfg)?;
            return Ok(Reconfigured::Initialized);
        };

        if state.config.requires_rebuild(cfg) {
            self.initialize(cfg)?;
            return Ok(Reconfigured::Rebuilt);
        }

        let excluded = ExclusionSet::from_codes(&cfg.excluded_codes);
        debug!(excluded = excluded.len(), "exclusion set updated");
        state.excluded.store(Arc::new(excluded));
        Ok(Reconfigured::ExclusionsUpdated)
    }

    /// Detaches the state. Later calls behave as uninitialized.
    pub fn shutdown(&self) {
        if self.state.swap(None).is_some() {
            info!("engine shut down");
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.load().is_some()
    }

    /// Records one event from a raw severity index.
    ///
    /// Out-of-range severities, the reserved code `-1` and calls on an
    /// uninitialized engine are dropped silently.
    #[inline]
    pub fn record(&self, error_code: i32, db_id: u32, user_id: u32, severity_index: u8) {
        let Some(severity) = Severity::from_u8(severity_index) else {
            return;
        };
        self.record_event(Event {
            error_code,
            db_id,
            user_id,
            severity,
        });
    }

    #[inline]
    pub fn record_event(&self, event: Event) {
        if let Some(state) = self.state.load().as_ref() {
            state.record(&event);
        }
    }

    /// Counts one slow-statement message.
    #[inline]
    pub fn record_slow(&self) {
        if let Some(state) = self.state.load().as_ref() {
            state.slow.increment();
        }
    }

    /// Advances the ring to the next interval and returns its index.
    pub fn rotate(&self) -> Result<usize, EngineError> {
        let state = self.active()?;
        let next = state.ring.advance();
        state.rotations.fetch_add(1, Ordering::Relaxed);
        Ok(next)
    }

    /// Grouped rows for the last `window` completed intervals.
    pub fn collect(&self, window: usize) -> Result<Vec<GroupedRow>, EngineError> {
        let state = self.active()?;
        WindowAggregator::new(&state.ring, ErrorCatalog::global()).collect(window)
    }

    /// Grouped rows for one of the canonical windows.
    pub fn collect_window(&self, window: Window) -> Result<Vec<GroupedRow>, EngineError> {
        let intervals_count = self.active()?.geometry().intervals_count;
        self.collect(window.intervals(intervals_count))
    }

    /// Cumulative per-severity totals since the last reset.
    pub fn totals(&self) -> Result<[u64; SEVERITY_COUNT], EngineError> {
        Ok(self.active()?.totals.snapshot())
    }

    /// Clears stored events, totals and the slow counter.
    pub fn reset(&self) -> Result<(), EngineError> {
        self.active()?.reset();
        info!("engine counters reset");
        Ok(())
    }

    pub fn slow(&self) -> Result<SlowEventSnapshot, EngineError> {
        Ok(self.active()?.slow.read())
    }

    pub fn reset_slow(&self) -> Result<(), EngineError> {
        self.active()?.slow.reset();
        Ok(())
    }

    pub fn stats(&self) -> Result<EngineStats, EngineError> {
        Ok(self.active()?.stats())
    }

    /// Interval duration of the active state.
    pub fn interval(&self) -> Result<Duration, EngineError> {
        Ok(self.active()?.interval())
    }

    pub fn geometry(&self) -> Result<RingGeometry, EngineError> {
        Ok(self.active()?.geometry())
    }

    /// Currently excluded codes in textual form.
    pub fn excluded_codes(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.active()?.excluded.load().to_sqlstates())
    }

    fn active(&self) -> Result<Arc<GlobalState>, EngineError> {
        self.state.load_full().ok_or(EngineError::NotReady)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
