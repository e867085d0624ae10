use std::io::{self, Write};

use parking_lot::Mutex;

use crate::adapter::Adapter;
use crate::error::AdapterError;
use crate::record::LoggerRecord;
use crate::severity::Severity;

/// Writes each record as one JSON line.
///
/// Records whose aggregated severity is at or above the threshold
/// (`WARNING` by default) go to stderr, everything else to stdout.
pub struct StdioAdapter {
    out: Mutex<Box<dyn Write + Send>>,
    err: Mutex<Box<dyn Write + Send>>,
    stderr_threshold: Severity,
}

impl StdioAdapter {
    pub fn new() -> Self {
        Self::with_writers(io::stdout(), io::stderr())
    }

    /// Same routing, custom destinations.
    pub fn with_writers(out: impl Write + Send + 'static, err: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
            err: Mutex::new(Box::new(err)),
            stderr_threshold: Severity::Warning,
        }
    }

    pub fn stderr_threshold(mut self, threshold: Severity) -> Self {
        self.stderr_threshold = threshold;
        self
    }
}

impl Default for StdioAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Adapter for StdioAdapter {
    fn output(&self, record: &LoggerRecord) -> Result<(), AdapterError> {
        let line = record.to_json_line()?;
        let target = if record.runtime.severity.passes(self.stderr_threshold) {
            &self.err
        } else {
            &self.out
        };

        let mut writer = target.lock();
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "stdio"
    }
}

impl std::fmt::Debug for StdioAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioAdapter")
            .field("stderr_threshold", &self.stderr_threshold)
            .finish()
    }
}
