use crate::record::LogEntry;

/// Append-only, ordered buffer of the raw entries of one session.
#[derive(Debug, Default)]
pub struct Stacker {
    rows: Vec<LogEntry>,
}

impl Stacker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stack(&mut self, entry: LogEntry) {
        self.rows.push(entry);
    }

    /// Entries in call order.
    pub fn entries(&self) -> &[LogEntry] {
        &self.rows
    }

    pub fn has_entries(&self) -> bool {
        !self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
