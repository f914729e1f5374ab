use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregate::Window;
use crate::config::MIN_INTERVAL;
use crate::error::EngineError;
use crate::event::Severity;
use crate::rotator::new_ticker;
use crate::state::Engine;

/// Point-in-time statistics written to the stat file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatSnapshot {
    pub generated_at: DateTime<Utc>,
    /// Cumulative totals by severity label.
    pub totals: BTreeMap<&'static str, u64>,
    /// Short window first, then long.
    pub windows: Vec<WindowSummary>,
}

/// Counts of one window, per severity and per error name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowSummary {
    pub window_seconds: u64,
    pub counts: BTreeMap<&'static str, u64>,
    pub messages: BTreeMap<&'static str, BTreeMap<&'static str, u64>>,
}

impl StatSnapshot {
    /// Reads totals and both canonical windows from the engine.
    pub fn capture(engine: &Engine) -> Result<Self, EngineError> {
        let totals = engine.totals()?;
        let interval = engine.interval()?;
        let intervals_count = engine.geometry()?.intervals_count;

        let mut windows = Vec::with_capacity(Window::all().len());
        for window in Window::all() {
            let intervals = window.intervals(intervals_count);
            let mut summary = WindowSummary {
                window_seconds: interval.as_millis() as u64 * intervals as u64 / 1000,
                counts: Severity::all().iter().map(|s| (s.as_str(), 0)).collect(),
                messages: BTreeMap::new(),
            };
            for row in engine.collect(intervals)? {
                let severity = row.key.severity.as_str();
                *summary.counts.entry(severity).or_default() += row.count;
                *summary
                    .messages
                    .entry(severity)
                    .or_default()
                    .entry(row.name)
                    .or_default() += row.count;
            }
            windows.push(summary);
        }

        Ok(Self {
            generated_at: Utc::now(),
            totals: Severity::all()
                .iter()
                .map(|s| (s.as_str(), totals[s.index()]))
                .collect(),
            windows,
        })
    }
}

/// Writes a [`StatSnapshot`] to a JSON file once per interval.
///
/// Each write goes to `<file>.tmp` first and is renamed over the target, so
/// readers never observe a partial file.
pub struct StatFileWriter {
    path: PathBuf,
    engine: Arc<Engine>,
}

impl StatFileWriter {
    pub fn new(path: impl Into<PathBuf>, engine: Arc<Engine>) -> Self {
        Self {
            path: path.into(),
            engine,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Captures a snapshot and replaces the stat file with it.
    pub fn write(&self) -> Result<()> {
        let snapshot = StatSnapshot::capture(&self.engine)?;
        let data = serde_json::to_vec_pretty(&snapshot).context("encoding stat snapshot")?;

        let temp_path = temp_path(&self.path);
        let mut file = File::create(&temp_path)
            .with_context(|| format!("creating {}", temp_path.display()))?;
        file.write_all(&data)
            .with_context(|| format!("writing {}", temp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("syncing {}", temp_path.display()))?;

        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("renaming into {}", self.path.display()))?;

        Ok(())
    }

    /// Rewrites the stat file once per engine interval until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        let mut period = self.engine.interval().unwrap_or(MIN_INTERVAL);
        let mut ticker = new_ticker(period);
        info!(path = %self.path().display(), "stat file writer started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("stat file writer stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.write() {
                        match e.downcast_ref::<EngineError>() {
                            Some(EngineError::NotReady) => debug!("engine not ready, skipping stat file"),
                            _ => warn!(error = ?e, path = %self.path.display(), "stat file write failed"),
                        }
                    }

                    if let Ok(current) = self.engine.interval() {
                        if current != period {
                            period = current;
                            ticker = new_ticker(period);
                        }
                    }
                }
            }
        }
    }
}

/// `<path>.tmp`, keeping any existing extension.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::sqlstate;
    use crate::config::EngineConfig;
    use std::time::Duration;

    fn engine() -> Arc<Engine> {
        let engine = Arc::new(Engine::new());
        engine
            .initialize(&EngineConfig {
                interval: Duration::from_secs(1),
                intervals_count: 3,
                messages_per_interval: 16,
                excluded_codes: Vec::new(),
            })
            .expect("init");
        engine
    }

    fn read_json(path: &Path) -> serde_json::Value {
        let data = fs::read(path).expect("read stat file");
        serde_json::from_slice(&data).expect("json")
    }

    #[test]
    fn test_temp_path_appends_suffix() {
        assert_eq!(
            temp_path(Path::new("/var/log/logerrors.json")),
            PathBuf::from("/var/log/logerrors.json.tmp")
        );
    }

    #[test]
    fn test_capture_groups_by_severity_and_name() {
        let engine = engine();
        let undefined = sqlstate::parse("42P01").expect("valid");
        engine.record(undefined, 1, 1, Severity::Error as u8);
        engine.record(undefined, 2, 3, Severity::Error as u8);
        engine.record(sqlstate::parse("01000").expect("valid"), 1, 1, Severity::Warning as u8);
        engine.rotate().expect("rotate");
        engine.record(undefined, 1, 1, Severity::Error as u8);
        engine.rotate().expect("rotate");

        let snapshot = StatSnapshot::capture(&engine).expect("snapshot");
        assert_eq!(snapshot.totals["ERROR"], 3);
        assert_eq!(snapshot.totals["WARNING"], 1);
        assert_eq!(snapshot.totals["FATAL"], 0);

        let short = &snapshot.windows[0];
        assert_eq!(short.window_seconds, 1);
        assert_eq!(short.counts["ERROR"], 1);
        assert_eq!(short.counts["WARNING"], 0);

        let long = &snapshot.windows[1];
        assert_eq!(long.window_seconds, 3);
        assert_eq!(long.counts["ERROR"], 3);
        assert_eq!(long.messages["ERROR"]["undefined_table"], 3);
        assert_eq!(long.messages["WARNING"]["warning"], 1);
    }

    #[test]
    fn test_write_replaces_file_atomically() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("stats.json");
        fs::write(&path, b"stale").expect("seed file");

        let engine = engine();
        engine.record(sqlstate::parse("23505").expect("valid"), 1, 1, Severity::Fatal as u8);
        engine.rotate().expect("rotate");

        let writer = StatFileWriter::new(&path, Arc::clone(&engine));
        writer.write().expect("write");

        let json = read_json(&path);
        assert_eq!(json["totals"]["FATAL"], 1);
        assert_eq!(json["windows"][0]["messages"]["FATAL"]["unique_violation"], 1);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_write_on_detached_engine_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = StatFileWriter::new(dir.path().join("stats.json"), Arc::new(Engine::new()));
        let err = writer.write().expect_err("not ready");
        assert_eq!(err.downcast_ref::<EngineError>(), Some(&EngineError::NotReady));
        assert!(!writer.path().exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_writes_each_interval() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("stats.json");
        let engine = engine();
        engine.record(sqlstate::parse("42P01").expect("valid"), 1, 1, Severity::Error as u8);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(StatFileWriter::new(&path, Arc::clone(&engine)).run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!path.exists());

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(read_json(&path)["totals"]["ERROR"], 1);

        cancel.cancel();
        handle.await.expect("writer task");
    }
}
