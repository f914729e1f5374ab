pub mod slow;
pub mod stats;

use std::fmt;

/// Raw server log levels as emitted by the database's logging subsystem.
pub mod level {
    pub const LOG: u8 = 15;
    pub const INFO: u8 = 17;
    pub const NOTICE: u8 = 18;
    pub const WARNING: u8 = 19;
    pub const WARNING_CLIENT_ONLY: u8 = 20;
    pub const ERROR: u8 = 21;
    pub const FATAL: u8 = 22;
    pub const PANIC: u8 = 23;

    const NAMES: [(&str, u8); 8] = [
        ("LOG", LOG),
        ("INFO", INFO),
        ("NOTICE", NOTICE),
        ("WARNING", WARNING),
        ("WARNING_CLIENT_ONLY", WARNING_CLIENT_ONLY),
        ("ERROR", ERROR),
        ("FATAL", FATAL),
        ("PANIC", PANIC),
    ];

    /// Parses a level name such as "ERROR", case-insensitively.
    pub fn from_name(name: &str) -> Option<u8> {
        NAMES
            .iter()
            .find(|(label, _)| label.eq_ignore_ascii_case(name))
            .map(|&(_, raw)| raw)
    }
}

/// Severity of a tracked event. Part of the grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Severity {
    Warning = 0,
    Error = 1,
    Fatal = 2,
}

/// Number of tracked severities, used for array sizing.
pub const SEVERITY_COUNT: usize = 3;

impl Severity {
    /// Returns the canonical label used in reports and metrics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }

    /// Convert from a severity index in `[0, SEVERITY_COUNT)`.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Warning),
            1 => Some(Self::Error),
            2 => Some(Self::Fatal),
            _ => None,
        }
    }

    /// Maps a raw server log level onto a tracked severity.
    ///
    /// Levels below WARNING and PANIC are not tracked.
    pub fn from_level(raw: u8) -> Option<Self> {
        match raw {
            level::WARNING | level::WARNING_CLIENT_ONLY => Some(Self::Warning),
            level::ERROR => Some(Self::Error),
            level::FATAL => Some(Self::Fatal),
            _ => None,
        }
    }

    /// Return all severities in index order.
    pub fn all() -> &'static [Self] {
        &[Self::Warning, Self::Error, Self::Fatal]
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single recorded occurrence. Stored by value in the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Packed SQLSTATE code.
    pub error_code: i32,
    pub db_id: u32,
    pub user_id: u32,
    pub severity: Severity,
}

/// A log record as handed over by the database's log hook.
#[derive(Debug, Clone, Copy)]
pub struct LogRecord<'a> {
    /// Raw server log level.
    pub level: u8,
    /// Packed SQLSTATE code.
    pub sqlstate: i32,
    pub db_id: u32,
    pub user_id: u32,
    pub message: &'a str,
}
