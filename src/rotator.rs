use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MIN_INTERVAL;
use crate::error::EngineError;
use crate::state::Engine;

/// Periodic actor that moves the engine to its next interval.
///
/// Only one rotator may drive an engine at a time.
pub struct IntervalRotator {
    engine: Arc<Engine>,
}

impl IntervalRotator {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    /// Performs a single rotation.
    pub fn rotate(&self) -> Result<usize, EngineError> {
        self.engine.rotate()
    }

    /// Rotates once per interval until cancelled.
    ///
    /// Missed ticks are skipped rather than replayed. The ticker follows the
    /// engine's interval when a reload changes it.
    pub async fn run(self, cancel: CancellationToken) {
        let mut period = self.engine.interval().unwrap_or(MIN_INTERVAL);
        let mut ticker = new_ticker(period);
        info!(interval_ms = period.as_millis() as u64, "interval rotator started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("interval rotator stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match self.rotate() {
                        Ok(index) => debug!(index, "rotated interval"),
                        Err(EngineError::NotReady) => debug!("engine not ready, skipping rotation"),
                        Err(e) => warn!(error = %e, "rotation failed"),
                    }

                    if let Ok(current) = self.engine.interval() {
                        if current != period {
                            info!(
                                old_ms = period.as_millis() as u64,
                                new_ms = current.as_millis() as u64,
                                "rotation interval changed",
                            );
                            period = current;
                            ticker = new_ticker(period);
                        }
                    }
                }
            }
        }
    }
}

/// The first tick fires one full period from now.
pub(crate) fn new_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
