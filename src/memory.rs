//! In-memory adapter for tests and for inspecting output programmatically.

use parking_lot::Mutex;

use crate::adapter::{Adapter, StreamingAdapter};
use crate::config::Config;
use crate::error::AdapterError;
use crate::record::{LogEntry, LoggerRecord};

/// Keeps every record it receives, and, when registered as a streaming
/// adapter, every live entry as well.
///
/// ```
/// use std::sync::Arc;
/// use logone::logone::Logone;
/// use logone::memory::MemoryAdapter;
///
/// let memory = Arc::new(MemoryAdapter::new());
/// let logone = Logone::new(memory.clone());
///
/// let session = logone.start("job", ());
/// session.logger().info("started");
/// session.finish().unwrap();
///
/// let records = memory.records();
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].runtime.lines[0].message, "started");
/// ```
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    records: Mutex<Vec<LoggerRecord>>,
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records received so far.
    pub fn records(&self) -> Vec<LoggerRecord> {
        self.records.lock().clone()
    }

    /// Live entries received so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Remove and return all stored records.
    pub fn drain_records(&self) -> Vec<LoggerRecord> {
        std::mem::take(&mut *self.records.lock())
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Adapter for MemoryAdapter {
    fn output(&self, record: &LoggerRecord) -> Result<(), AdapterError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

impl StreamingAdapter for MemoryAdapter {
    fn on_entry(&self, entry: &LogEntry, _config: &Config) -> Result<(), AdapterError> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}
