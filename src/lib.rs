//! Per-session structured logging.
//!
//! A [`Logone`] opens a [`Session`] per unit of work (a request, a job). The
//! session's [`Logger`] collects entries; finishing the session filters,
//! sanitizes and aggregates them into a single [`LoggerRecord`] that is
//! handed to every registered [`Adapter`].

pub mod adapter;
pub mod caller;
pub mod config;
pub mod env;
pub mod error;
pub mod logger;
pub mod logone;
pub mod memory;
pub mod noop;
pub mod payload;
pub mod record;
pub mod sanitize;
pub mod severity;
pub mod stacker;
pub mod stdio;
pub mod timer;

#[cfg(feature = "channel")]
pub mod channel;

pub use adapter::{Adapter, AdapterHandle, AdapterSet, StreamingAdapter};
pub use config::{Config, ElapsedUnit, LogoneConfig, MaskKeyword};
pub use error::{AdapterError, ConfigError, LogoneError, SessionError, TimerError};
pub use logger::{Args, Logger, Message};
pub use logone::{FinishHandle, FinishOutcome, Logone, Session, Subscription};
pub use memory::MemoryAdapter;
pub use noop::NoopAdapter;
pub use payload::{ArrayRef, ErrorValue, ObjectRef, Payload, ToPayload};
pub use record::{Context, LogEntry, LogLine, LoggerRecord, Runtime};
pub use severity::Severity;
pub use stdio::StdioAdapter;
pub use timer::{Clock, ManualClock, SystemClock};

#[cfg(feature = "channel")]
pub use channel::{ChannelAdapter, ChannelConfig, RecordSink};

/// Text of a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
