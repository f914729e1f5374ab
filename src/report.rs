use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

use crate::aggregate::{GroupedRow, Window};
use crate::catalog::sqlstate;
use crate::config::IdentitiesConfig;
use crate::error::EngineError;
use crate::event::Severity;
use crate::state::Engine;

/// Name used for the per-severity total rows.
pub const TOTAL_ROW_NAME: &str = "TOTAL";

/// Resolves numeric ids to display names at report time.
pub trait IdentityResolver: Send + Sync {
    fn database_name(&self, db_id: u32) -> Option<String>;
    fn user_name(&self, user_id: u32) -> Option<String>;
}

/// Resolver that knows no names.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopResolver;

impl IdentityResolver for NoopResolver {
    fn database_name(&self, _db_id: u32) -> Option<String> {
        None
    }

    fn user_name(&self, _user_id: u32) -> Option<String> {
        None
    }
}

/// Resolver backed by static id to name maps.
#[derive(Debug, Default, Clone)]
pub struct MapResolver {
    databases: HashMap<u32, String>,
    users: HashMap<u32, String>,
}

impl MapResolver {
    pub fn new(databases: HashMap<u32, String>, users: HashMap<u32, String>) -> Self {
        Self { databases, users }
    }

    pub fn from_config(cfg: &IdentitiesConfig) -> Self {
        Self::new(cfg.databases.clone(), cfg.users.clone())
    }
}

impl IdentityResolver for MapResolver {
    fn database_name(&self, db_id: u32) -> Option<String> {
        self.databases.get(&db_id).cloned()
    }

    fn user_name(&self, user_id: u32) -> Option<String> {
        self.users.get(&user_id).cloned()
    }
}

/// One row of the error report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    /// Window length in seconds, absent on total rows.
    pub window_seconds: Option<u64>,
    pub severity: String,
    pub name: String,
    pub count: u64,
    pub user: Option<String>,
    pub database: Option<String>,
    /// Five-character SQLSTATE, absent on total rows.
    pub code: Option<String>,
}

/// Builder for the combined totals and windowed report.
pub struct Report;

impl Report {
    /// Builds rows in order: per-severity totals, short window, long window.
    pub fn build(
        engine: &Engine,
        resolver: &dyn IdentityResolver,
    ) -> Result<Vec<ReportRow>, EngineError> {
        let interval = engine.interval()?;
        let intervals_count = engine.geometry()?.intervals_count;
        let totals = engine.totals()?;

        let mut rows: Vec<ReportRow> = Severity::all()
            .iter()
            .map(|severity| ReportRow {
                window_seconds: None,
                severity: severity.as_str().to_string(),
                name: TOTAL_ROW_NAME.to_string(),
                count: totals[severity.index()],
                user: None,
                database: None,
                code: None,
            })
            .collect();

        for window in Window::all() {
            let intervals = window.intervals(intervals_count);
            rows.extend(Self::window_rows(engine, intervals, interval, resolver)?);
        }

        Ok(rows)
    }

    /// Builds the rows of a single window of `intervals` intervals.
    pub fn build_window(
        engine: &Engine,
        intervals: usize,
        resolver: &dyn IdentityResolver,
    ) -> Result<Vec<ReportRow>, EngineError> {
        Self::window_rows(engine, intervals, engine.interval()?, resolver)
    }

    fn window_rows(
        engine: &Engine,
        intervals: usize,
        interval: Duration,
        resolver: &dyn IdentityResolver,
    ) -> Result<Vec<ReportRow>, EngineError> {
        let grouped = engine.collect(intervals)?;
        let seconds = interval.as_millis() as u64 * intervals as u64 / 1000;
        Ok(grouped
            .iter()
            .map(|row| window_row(row, seconds, resolver))
            .collect())
    }
}

fn window_row(row: &GroupedRow, seconds: u64, resolver: &dyn IdentityResolver) -> ReportRow {
    ReportRow {
        window_seconds: Some(seconds),
        severity: row.key.severity.as_str().to_string(),
        name: row.name.to_string(),
        count: row.count,
        user: resolver.user_name(row.key.user_id),
        database: resolver.database_name(row.key.db_id),
        code: Some(sqlstate::unpack(row.key.error_code)),
    }
}
