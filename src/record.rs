use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::config::Config;
use crate::payload::Payload;
use crate::severity::Severity;

/// One logged call.
///
/// Raw entries (as stored during the session and handed to live listeners)
/// carry a [`Payload`]; the sanitized lines inside a [`LoggerRecord`] carry
/// plain JSON, see [`LogLine`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry<P = Payload> {
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<P>,
    #[serde(serialize_with = "serialize_time")]
    pub time: DateTime<Utc>,
    pub file_name: Option<String>,
    pub file_line: Option<u32>,
    pub func_name: Option<String>,
}

/// A sanitized entry: filtered, de-cycled, stringified and masked.
pub type LogLine = LogEntry<Value>;

impl<P> LogEntry<P> {
    /// Same entry with its payload replaced by `f(payload)`.
    pub fn map_payload<Q>(self, f: impl FnOnce(P) -> Q) -> LogEntry<Q> {
        LogEntry {
            severity: self.severity,
            message: self.message,
            payload: self.payload.map(f),
            time: self.time,
            file_name: self.file_name,
            file_line: self.file_line,
            func_name: self.func_name,
        }
    }
}

/// Caller-supplied description of the session, e.g. request id and route.
///
/// Copied into the record as-is; it is not sanitized.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Context(pub Map<String, Value>);

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl From<()> for Context {
    fn from(_: ()) -> Self {
        Context::default()
    }
}

impl From<Map<String, Value>> for Context {
    fn from(map: Map<String, Value>) -> Self {
        Context(map)
    }
}

impl From<Value> for Context {
    /// Objects are used as-is; any other value is kept under `"value"`.
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Context(map),
            Value::Null => Context::default(),
            other => Context::default().with("value", other),
        }
    }
}

/// Timing and content of a finished session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Runtime {
    pub severity: Severity,
    #[serde(serialize_with = "serialize_time")]
    pub start_time: DateTime<Utc>,
    #[serde(serialize_with = "serialize_time")]
    pub end_time: DateTime<Utc>,
    /// `end_time - start_time` in `config.elapsed_unit`.
    pub elapsed: i64,
    pub lines: Vec<LogLine>,
}

/// The unit handed to adapters: exactly one per finished, non-empty session.
#[derive(Debug, Clone, Serialize)]
pub struct LoggerRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub context: Context,
    pub runtime: Runtime,
    pub config: Config,
}

impl LoggerRecord {
    /// One JSON line, newline-terminated.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        Ok(serde_json::to_string(self)? + "\n")
    }
}

/// ISO-8601 in UTC with millisecond precision, e.g. `2024-01-01T00:00:00.000Z`.
pub fn to_iso8601(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn serialize_time<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_iso8601(time))
}
