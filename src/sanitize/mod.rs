//! The record-assembly pipeline run when a session finishes.
//!
//! Stages always run in this order:
//!
//! 1. [`filter_by_level`] drops entries below the configured threshold.
//! 2. [`exclude_circular`] converts custom values and turns the payload
//!    graph into a tree.
//! 3. [`stringify`] converts big integers, dates and errors into plain
//!    JSON.
//! 4. [`mask_secrets`] hides values selected by the mask keywords.
//!
//! De-cycling comes before stringification so that stringification always
//! terminates. Masking comes last so that secrets nested inside errors or
//! custom values are already plain keys and strings by the time it runs.

mod circular;
mod level;
mod mask;
mod stringify;

use std::panic::{catch_unwind, AssertUnwindSafe};

pub use circular::{exclude_circular, CIRCULAR};
pub use level::filter_by_level;
pub use mask::mask_secrets;
pub use stringify::stringify;

use crate::config::Config;
use crate::error::AdapterError;
use crate::payload::{Payload, ToPayload};
use crate::record::{LogEntry, LogLine};

/// Run all four stages over a session's raw entries.
///
/// Order is preserved; the result is empty when every entry was filtered.
pub fn run(entries: &[LogEntry], config: &Config) -> Vec<LogLine> {
    let kept = filter_by_level(entries, config.log_level);

    let acyclic = kept
        .into_iter()
        .map(|entry| entry.map_payload(|payload| exclude_circular(&payload)));

    let plain = acyclic.map(|entry| entry.map_payload(stringify));

    plain
        .map(|entry| entry.map_payload(|value| mask_secrets(value, &config.mask_keywords)))
        .collect()
}

/// Sanitize a single live entry, for streaming adapters.
///
/// Returns `None` when the entry is below the configured level.
pub fn sanitize_entry(entry: &LogEntry, config: &Config) -> Option<LogLine> {
    run(std::slice::from_ref(entry), config).pop()
}

/// Call a custom conversion, treating a panic like an error.
pub(crate) fn convert_custom(value: &dyn ToPayload) -> Result<Payload, AdapterError> {
    match catch_unwind(AssertUnwindSafe(|| value.to_payload())) {
        Ok(result) => result,
        Err(panic) => Err(crate::panic_message(panic.as_ref()).into()),
    }
}
