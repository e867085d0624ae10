use crate::record::LogEntry;
use crate::severity::Severity;

/// Keep entries at or above `level`, in their original order.
pub fn filter_by_level<P: Clone>(entries: &[LogEntry<P>], level: Severity) -> Vec<LogEntry<P>> {
    entries
        .iter()
        .filter(|entry| entry.severity.passes(level))
        .cloned()
        .collect()
}
