use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::error::AdapterError;
use crate::record::{LogEntry, LoggerRecord};

/// Destination for finished [`LoggerRecord`]s.
///
/// Implementations transport records to a concrete backend (stdout, a
/// file, a queue, an HTTP collector...). `output` is called synchronously
/// from `finish`, once per finished, non-empty session.
pub trait Adapter: Send + Sync {
    /// Deliver one fully sanitized record.
    ///
    /// **Returns**
    /// - `Ok(())` if the backend accepted the record.
    /// - `Err(..)` if it did not. The orchestrator reports the error and
    ///   carries on with the remaining adapters; it never retries.
    ///
    /// A panic is treated like an `Err`.
    fn output(&self, record: &LoggerRecord) -> Result<(), AdapterError>;

    /// Name used in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// An [`Adapter`] that also wants every entry live, as it is logged.
///
/// Entries arrive raw: not filtered by level and not sanitized. Use
/// [`sanitize_entry`](crate::sanitize::sanitize_entry) to apply the same
/// pipeline a finished record goes through.
pub trait StreamingAdapter: Adapter {
    fn on_entry(&self, entry: &LogEntry, config: &Config) -> Result<(), AdapterError>;
}

/// A registered adapter together with its capability.
///
/// Whether an adapter streams is decided here, once, at registration time.
#[derive(Clone)]
pub enum AdapterHandle {
    Output(Arc<dyn Adapter>),
    Streaming(Arc<dyn StreamingAdapter>),
}

impl AdapterHandle {
    pub fn output<A: Adapter + 'static>(adapter: Arc<A>) -> Self {
        AdapterHandle::Output(adapter)
    }

    pub fn streaming<A: StreamingAdapter + 'static>(adapter: Arc<A>) -> Self {
        AdapterHandle::Streaming(adapter)
    }

    pub fn name(&self) -> &str {
        match self {
            AdapterHandle::Output(adapter) => adapter.name(),
            AdapterHandle::Streaming(adapter) => adapter.name(),
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, AdapterHandle::Streaming(_))
    }

    pub(crate) fn output_record(&self, record: &LoggerRecord) -> Result<(), AdapterError> {
        match self {
            AdapterHandle::Output(adapter) => adapter.output(record),
            AdapterHandle::Streaming(adapter) => adapter.output(record),
        }
    }

    pub(crate) fn as_streaming(&self) -> Option<&dyn StreamingAdapter> {
        match self {
            AdapterHandle::Output(_) => None,
            AdapterHandle::Streaming(adapter) => Some(adapter.as_ref()),
        }
    }
}

impl fmt::Debug for AdapterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_streaming() { "Streaming" } else { "Output" };
        f.debug_tuple(kind).field(&self.name()).finish()
    }
}

impl<A: Adapter + 'static> From<Arc<A>> for AdapterHandle {
    fn from(adapter: Arc<A>) -> Self {
        AdapterHandle::Output(adapter)
    }
}

/// One or more adapters, as accepted by [`Logone::new`](crate::logone::Logone::new).
#[derive(Debug, Clone, Default)]
pub struct AdapterSet(pub Vec<AdapterHandle>);

impl AdapterSet {
    pub fn into_vec(self) -> Vec<AdapterHandle> {
        self.0
    }
}

impl From<AdapterHandle> for AdapterSet {
    fn from(handle: AdapterHandle) -> Self {
        AdapterSet(vec![handle])
    }
}

impl<A: Adapter + 'static> From<Arc<A>> for AdapterSet {
    fn from(adapter: Arc<A>) -> Self {
        AdapterSet(vec![AdapterHandle::output(adapter)])
    }
}

impl From<Vec<AdapterHandle>> for AdapterSet {
    fn from(handles: Vec<AdapterHandle>) -> Self {
        AdapterSet(handles)
    }
}

impl<const N: usize> From<[AdapterHandle; N]> for AdapterSet {
    fn from(handles: [AdapterHandle; N]) -> Self {
        AdapterSet(handles.into())
    }
}
