use anyhow::Result;
use prometheus::{IntGauge, IntGaugeVec, Opts, Registry};

use crate::event::Severity;
use crate::state::EngineStats;

/// Prometheus self-metrics of the engine.
///
/// All metrics use the "logerrors" namespace. Values mirror the engine's own
/// counters and are refreshed on every scrape, so an admin reset shows up as
/// a drop to zero.
pub struct EngineMetrics {
    registry: Registry,

    /// Recorded events by severity since the last reset.
    pub events_recorded: IntGaugeVec,
    /// Events dropped because their code is excluded.
    pub events_excluded: IntGauge,
    /// Interval rotations since the state was built.
    pub rotations: IntGauge,
    /// Stored events overwritten by interval overflow.
    pub slots_overwritten: IntGauge,
    /// Slow-statement messages since the last slow reset.
    pub slow_events: IntGauge,
    /// 1 while the engine has state attached.
    pub engine_active: IntGauge,
}

impl EngineMetrics {
    /// Creates the metric set with every metric registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let events_recorded = IntGaugeVec::new(
            Opts::new(
                "events_recorded_total",
                "Events recorded by severity since the last reset.",
            )
            .namespace("logerrors"),
            &["severity"],
        )?;
        let events_excluded = IntGauge::with_opts(
            Opts::new(
                "events_excluded_total",
                "Events dropped because their code is excluded.",
            )
            .namespace("logerrors"),
        )?;
        let rotations = IntGauge::with_opts(
            Opts::new("rotations_total", "Interval rotations performed.")
                .namespace("logerrors"),
        )?;
        let slots_overwritten = IntGauge::with_opts(
            Opts::new(
                "slots_overwritten",
                "Stored events overwritten because an interval was full.",
            )
            .namespace("logerrors"),
        )?;
        let slow_events = IntGauge::with_opts(
            Opts::new(
                "slow_events",
                "Slow-statement messages since the last slow reset.",
            )
            .namespace("logerrors"),
        )?;
        let engine_active = IntGauge::with_opts(
            Opts::new(
                "engine_active",
                "Whether the engine is initialized (1=yes, 0=no).",
            )
            .namespace("logerrors"),
        )?;

        registry.register(Box::new(events_recorded.clone()))?;
        registry.register(Box::new(events_excluded.clone()))?;
        registry.register(Box::new(rotations.clone()))?;
        registry.register(Box::new(slots_overwritten.clone()))?;
        registry.register(Box::new(slow_events.clone()))?;
        registry.register(Box::new(engine_active.clone()))?;

        Ok(Self {
            registry,
            events_recorded,
            events_excluded,
            rotations,
            slots_overwritten,
            slow_events,
            engine_active,
        })
    }

    /// Copies a stats snapshot into the gauges. `None` marks the engine as
    /// inactive and leaves the other values untouched.
    pub fn observe(&self, stats: Option<&EngineStats>) {
        let Some(stats) = stats else {
            self.engine_active.set(0);
            return;
        };

        self.engine_active.set(1);
        for severity in Severity::all() {
            self.events_recorded
                .with_label_values(&[severity.as_str()])
                .set(clamp(stats.totals[severity.index()]));
        }
        self.events_excluded.set(clamp(stats.excluded_events));
        self.rotations.set(clamp(stats.rotations));
        self.slots_overwritten.set(clamp(stats.overwritten));
        self.slow_events.set(clamp(stats.slow_events));
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

fn clamp(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}
