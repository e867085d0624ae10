use crate::adapter::Adapter;
use crate::error::AdapterError;
use crate::record::LoggerRecord;

/// An adapter that simply drops all records.
///
/// Useful for measuring the overhead of the session pipeline itself without
/// any I/O, and for tests that don't care about delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAdapter;

impl Adapter for NoopAdapter {
    fn output(&self, _record: &LoggerRecord) -> Result<(), AdapterError> {
        Ok(())
    }
}
