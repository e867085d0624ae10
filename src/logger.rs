use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe, Location};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::caller;
use crate::payload::{ArrayRef, ErrorValue, ObjectRef, Payload};
use crate::record::LogEntry;
use crate::severity::Severity;
use crate::stacker::Stacker;
use crate::timer::Timer;

/// Called for every recorded entry, after it has been stacked.
pub(crate) type EntryCallback = Arc<dyn Fn(&LogEntry) + Send + Sync>;

/// What a log call says: a plain message or an error.
#[derive(Debug, Clone)]
pub enum Message {
    Text(String),
    Error(ErrorValue),
}

impl From<&str> for Message {
    fn from(value: &str) -> Self {
        Message::Text(value.to_string())
    }
}

impl From<String> for Message {
    fn from(value: String) -> Self {
        Message::Text(value)
    }
}

impl From<&String> for Message {
    fn from(value: &String) -> Self {
        Message::Text(value.clone())
    }
}

impl From<ErrorValue> for Message {
    fn from(value: ErrorValue) -> Self {
        Message::Error(value)
    }
}

/// Trailing arguments of a log call.
///
/// One argument becomes the payload as-is; several become an array.
#[derive(Debug, Clone, Default)]
pub struct Args(Vec<Payload>);

impl Args {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_payload(mut self) -> Option<Payload> {
        match self.0.len() {
            0 => None,
            1 => self.0.pop(),
            _ => Some(Payload::Array(ArrayRef::from_vec(self.0))),
        }
    }
}

impl From<Payload> for Args {
    fn from(value: Payload) -> Self {
        Args(vec![value])
    }
}

impl From<Vec<Payload>> for Args {
    fn from(values: Vec<Payload>) -> Self {
        Args(values)
    }
}

impl<const N: usize> From<[Payload; N]> for Args {
    fn from(values: [Payload; N]) -> Self {
        Args(values.into())
    }
}

impl From<serde_json::Value> for Args {
    fn from(value: serde_json::Value) -> Self {
        Args(vec![Payload::from(value)])
    }
}

impl From<ObjectRef> for Args {
    fn from(value: ObjectRef) -> Self {
        Args(vec![Payload::Object(value)])
    }
}

/// Mutable state of one session, shared by its [`Logger`] clones and its
/// finish handle.
pub(crate) struct SessionState {
    pub(crate) timer: Mutex<Timer>,
    pub(crate) stacker: Mutex<Stacker>,
    /// Set once, under the `stacker` lock, by the first `finish`.
    pub(crate) finished: AtomicBool,
    on_entry: Option<EntryCallback>,
}

/// Per-session logging facade.
///
/// Cheap to clone; all clones write into the same session. Every method is
/// `#[track_caller]`, so entries point at the line that called the logger.
///
/// ```
/// use logone::logger::Logger;
/// use logone::payload::{ErrorValue, Payload};
/// use logone::stacker::Stacker;
/// use logone::timer::Timer;
/// use logone::config::ElapsedUnit;
///
/// let logger = Logger::new(Timer::new(ElapsedUnit::Millisecond), Stacker::new());
/// logger.info("user signed in");
/// logger.warning_with("slow query", Payload::object([("ms", 1200)]));
/// logger.error(ErrorValue::new("IoError", "connection reset"));
///
/// let entries = logger.entries();
/// assert_eq!(entries.len(), 3);
/// assert_eq!(entries[2].message, "connection reset");
/// ```
#[derive(Clone)]
pub struct Logger {
    state: Arc<SessionState>,
}

macro_rules! severity_methods {
    ($($severity:ident => $plain:ident, $with:ident;)*) => {
        $(
            #[track_caller]
            pub fn $plain(&self, message: impl Into<Message>) {
                self.add_entry(Severity::$severity, message.into(), Args::none(), Location::caller());
            }

            #[track_caller]
            pub fn $with(&self, message: impl Into<Message>, args: impl Into<Args>) {
                self.add_entry(Severity::$severity, message.into(), args.into(), Location::caller());
            }
        )*
    };
}

impl Logger {
    /// A logger writing into `stacker`, timestamping with `timer`.
    pub fn new(timer: Timer, stacker: Stacker) -> Self {
        Self::with_callback(timer, stacker, None)
    }

    pub(crate) fn with_callback(timer: Timer, stacker: Stacker, on_entry: Option<EntryCallback>) -> Self {
        Self {
            state: Arc::new(SessionState {
                timer: Mutex::new(timer),
                stacker: Mutex::new(stacker),
                finished: AtomicBool::new(false),
                on_entry,
            }),
        }
    }

    severity_methods! {
        Debug => debug, debug_with;
        Info => info, info_with;
        Warning => warning, warning_with;
        Error => error, error_with;
        Critical => critical, critical_with;
    }

    #[track_caller]
    pub fn record(&self, severity: Severity, message: impl Into<Message>) {
        self.add_entry(severity, message.into(), Args::none(), Location::caller());
    }

    #[track_caller]
    pub fn record_with(&self, severity: Severity, message: impl Into<Message>, args: impl Into<Args>) {
        self.add_entry(severity, message.into(), args.into(), Location::caller());
    }

    /// Snapshot of the raw entries recorded so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.state.stacker.lock().entries().to_vec()
    }

    pub fn has_entries(&self) -> bool {
        self.state.stacker.lock().has_entries()
    }

    pub(crate) fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    fn add_entry(&self, severity: Severity, message: Message, args: Args, location: &Location<'_>) {
        let position = caller::resolve(location);
        let (message, payload) = resolve_message(message, args);
        let time = self.state.timer.lock().current_time();

        let entry = LogEntry {
            severity,
            message,
            payload,
            time,
            file_name: position.file_name,
            file_line: position.file_line,
            func_name: position.func_name,
        };

        {
            let mut stacker = self.state.stacker.lock();
            if self.state.finished.load(Ordering::Acquire) {
                tracing::debug!(%severity, entry = %entry.message, "session already finished; entry dropped");
                return;
            }
            match &self.state.on_entry {
                Some(_) => stacker.stack(entry.clone()),
                None => {
                    stacker.stack(entry);
                    return;
                }
            }
        }

        if let Some(callback) = &self.state.on_entry {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(&entry))) {
                tracing::error!(panic = %crate::panic_message(panic.as_ref()), "entry callback panicked");
            }
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("entries", &self.state.stacker.lock().len())
            .field("finished", &self.state.finished.load(Ordering::Relaxed))
            .finish()
    }
}

/// Split a call into the entry's message and payload.
///
/// For an error, the message is the error's message and the payload is
/// `{error}` plus `args` when trailing arguments were given.
fn resolve_message(message: Message, args: Args) -> (String, Option<Payload>) {
    match message {
        Message::Text(text) => (text, args.into_payload()),
        Message::Error(error) => {
            let text = error.message.clone();
            let payload = ObjectRef::new();
            payload.insert("error", error);
            if let Some(rest) = args.into_payload() {
                payload.insert("args", rest);
            }
            (text, Some(Payload::Object(payload)))
        }
    }
}
