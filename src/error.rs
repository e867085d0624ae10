use std::error::Error;

/// Error returned by adapters, listeners and async sinks.
///
/// Any backend error converts with `?` or `.into()`.
pub type AdapterError = Box<dyn Error + Send + Sync>;

/// Reading the session clock out of order.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    #[error("logger timer is not started")]
    NotStarted,

    #[error("logger timer is not ended")]
    NotEnded,
}

/// Misuse of the session lifecycle.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("cannot aggregate severity: session has no entries")]
    NoEntries,
}

/// Error type returned when parsing configuration values.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unknown severity: {0:?}")]
    UnknownSeverity(String),

    #[error("unknown elapsed unit: {0:?}")]
    UnknownElapsedUnit(String),

    #[error("invalid mask pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Top-level error for operations on a [`Logone`](crate::logone::Logone)
/// session.
#[derive(thiserror::Error, Debug)]
pub enum LogoneError {
    #[error(transparent)]
    Timer(#[from] TimerError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
