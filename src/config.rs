use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::error::EngineError;
use crate::ring::RingGeometry;

/// Shortest accepted interval duration.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);
/// Longest accepted interval duration.
pub const MAX_INTERVAL: Duration = Duration::from_secs(60);
/// Fewest retained intervals.
pub const MIN_INTERVALS_COUNT: usize = 2;
/// Most retained intervals.
pub const MAX_INTERVALS_COUNT: usize = 360;
/// Upper bound on slots per interval.
pub const MAX_MESSAGES_PER_INTERVAL: usize = 100_000;

/// Top-level configuration for the logerrors daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Logging verbosity (trace, debug, info, warn, error). Default: "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Event engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// HTTP report and metrics server configuration.
    #[serde(default)]
    pub export: ExportConfig,

    /// Static names for numeric database and user ids.
    #[serde(default)]
    pub identities: IdentitiesConfig,
}

/// Event engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Duration of one interval. Default: 5s.
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Intervals covered by the long window. Default: 120.
    #[serde(default = "default_intervals_count")]
    pub intervals_count: usize,

    /// Stored events per interval before overwriting. Default: 1000.
    #[serde(default = "default_messages_per_interval")]
    pub messages_per_interval: usize,

    /// SQLSTATE codes that are never recorded (e.g. "42P01").
    #[serde(default)]
    pub excluded_codes: Vec<String>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// Listen address. A leading ":port" binds all interfaces. Default: ":9187".
    #[serde(default = "default_export_addr")]
    pub addr: String,

    /// Stat file rewritten once per interval. Disabled when unset.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Identity names used when rendering reports.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentitiesConfig {
    /// Database id to name.
    #[serde(default)]
    pub databases: HashMap<u32, String>,

    /// User id to name.
    #[serde(default)]
    pub users: HashMap<u32, String>,
}

// --- Default value functions ---

fn default_log_level() -> String {
    "info".to_string()
}

fn default_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_intervals_count() -> usize {
    120
}

fn default_messages_per_interval() -> usize {
    1000
}

fn default_export_addr() -> String {
    ":9187".to_string()
}

// --- Default trait impls ---

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            engine: EngineConfig::default(),
            export: ExportConfig::default(),
            identities: IdentitiesConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            intervals_count: default_intervals_count(),
            messages_per_interval: default_messages_per_interval(),
            excluded_codes: Vec::new(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            addr: default_export_addr(),
            file: None,
        }
    }
}

// --- Validation and loading ---

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate the configuration for required fields and consistency.
    pub fn validate(&self) -> Result<()> {
        self.engine.validate().context("validating engine config")?;

        if self.export.addr.trim().is_empty() {
            bail!("export.addr must not be empty");
        }

        if let Some(file) = &self.export.file {
            if file.as_os_str().is_empty() {
                bail!("export.file must not be empty when set");
            }
        }

        Ok(())
    }
}

impl EngineConfig {
    /// Checks the ring geometry and interval bounds.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.interval < MIN_INTERVAL || self.interval > MAX_INTERVAL {
            return Err(EngineError::InvalidConfig(format!(
                "engine.interval {:?} must be between {:?} and {:?}",
                self.interval, MIN_INTERVAL, MAX_INTERVAL,
            )));
        }

        if !(MIN_INTERVALS_COUNT..=MAX_INTERVALS_COUNT).contains(&self.intervals_count) {
            return Err(EngineError::InvalidConfig(format!(
                "engine.intervals_count {} must be between {} and {}",
                self.intervals_count, MIN_INTERVALS_COUNT, MAX_INTERVALS_COUNT,
            )));
        }

        if !(1..=MAX_MESSAGES_PER_INTERVAL).contains(&self.messages_per_interval) {
            return Err(EngineError::InvalidConfig(format!(
                "engine.messages_per_interval {} must be between 1 and {}",
                self.messages_per_interval, MAX_MESSAGES_PER_INTERVAL,
            )));
        }

        Ok(())
    }

    pub fn geometry(&self) -> RingGeometry {
        RingGeometry {
            intervals_count: self.intervals_count,
            messages_per_interval: self.messages_per_interval,
        }
    }

    /// Returns true if applying `other` requires rebuilding the ring.
    pub fn requires_rebuild(&self, other: &EngineConfig) -> bool {
        self.interval != other.interval || self.geometry() != other.geometry()
    }
}
