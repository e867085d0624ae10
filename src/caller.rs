//! Best-effort source location of a log call.
//!
//! The logger's public methods are `#[track_caller]`, so
//! [`Location::caller`] already points past this crate's own frames. Not
//! knowing the location is a normal outcome: every field is then `None`.

use std::panic::Location;

/// Where a log call came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerPosition {
    pub file_name: Option<String>,
    pub file_line: Option<u32>,
    pub func_name: Option<String>,
}

impl CallerPosition {
    pub fn unknown() -> Self {
        Self::default()
    }
}

/// Path fragments of third-party dependency sources.
const DEPENDENCY_DIRS: [&str; 2] = [".cargo/registry/", ".cargo/git/"];

/// Resolve a caller location.
///
/// Locations inside third-party crates resolve to unknown: the interesting
/// caller is the application, and `Location` carries a single frame.
/// Function names are not available from `Location`.
pub fn resolve(location: &Location<'_>) -> CallerPosition {
    let file = location.file();
    if is_dependency(file) {
        return CallerPosition::unknown();
    }
    CallerPosition {
        file_name: Some(file.to_string()),
        file_line: Some(location.line()),
        func_name: None,
    }
}

fn is_dependency(file: &str) -> bool {
    let normalized = file.replace('\\', "/");
    DEPENDENCY_DIRS.iter().any(|dir| normalized.contains(dir))
}

/// Parse one textual stack frame.
///
/// For targets that expose stack traces only as text. Accepts
/// `at function (file:line:column)`, `at file:line:column` and the
/// `function at file:line:column` form printed by Rust backtraces. Frames
/// in third-party dependencies yield `None`.
pub fn parse_frame(frame: &str) -> Option<CallerPosition> {
    let frame = frame.trim();
    let frame = frame.strip_prefix("at ").unwrap_or(frame);

    let (func, location) = if let Some(open) = frame.rfind(" (") {
        let location = frame[open + 2..].strip_suffix(')')?;
        (Some(frame[..open].trim()), location)
    } else if let Some((func, location)) = frame.split_once(" at ") {
        (Some(func.trim()), location.trim())
    } else {
        (None, frame)
    };

    let (file, line) = split_file_line(location)?;
    if file.is_empty() || is_dependency(file) {
        return None;
    }

    Some(CallerPosition {
        file_name: Some(file.to_string()),
        file_line: Some(line),
        func_name: func.filter(|f| !f.is_empty()).map(str::to_string),
    })
}

/// `file:line:column` or `file:line`.
fn split_file_line(location: &str) -> Option<(&str, u32)> {
    let (rest, last) = location.rsplit_once(':')?;
    let last: u32 = last.parse().ok()?;
    match rest.rsplit_once(':') {
        Some((file, line)) => match line.parse::<u32>() {
            Ok(line) => Some((file, line)),
            Err(_) => Some((rest, last)),
        },
        None => Some((rest, last)),
    }
}
