use thiserror::Error;

/// Errors returned by engine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// No state is attached: the engine was never initialized or was shut down.
    #[error("engine is not initialized")]
    NotReady,

    #[error("window {window} is out of range, expected 1..={max}")]
    InvalidWindow { window: usize, max: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
