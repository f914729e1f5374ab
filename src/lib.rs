//! Time-windowed statistics of database warnings, errors and fatal events.
//!
//! Producers hand events to an [`Engine`] through a lock-free path; a single
//! [`IntervalRotator`] advances the interval ring; readers aggregate windows
//! on demand through [`Report`] or the HTTP export server.

pub mod agent;
pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod error;
pub mod event;
pub mod export;
pub mod hook;
pub mod report;
pub mod ring;
pub mod rotator;
pub mod state;

pub use crate::error::EngineError;
pub use crate::hook::{LogHook, LogSink};
pub use crate::report::{IdentityResolver, MapResolver, NoopResolver, Report, ReportRow};
pub use crate::rotator::IntervalRotator;
pub use crate::state::Engine;
