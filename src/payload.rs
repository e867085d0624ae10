//! Structured values attached to log entries.
//!
//! [`Payload`] is richer than JSON on purpose: callers hand over whatever
//! they have (shared or cyclic object graphs, 128-bit integers, timestamps,
//! errors, types with their own conversion) and the sanitization pipeline
//! turns it into plain JSON when the session finishes.
//!
//! Objects and arrays are reference types ([`ObjectRef`], [`ArrayRef`]):
//! cloning one shares the same storage, so an object can contain itself.
//! Such cycles are reference counted and stay alive until broken with
//! [`ObjectRef::remove`] / [`ArrayRef::clear`].

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Number;

use crate::error::AdapterError;

/// Fields of an object payload.
pub type Fields = BTreeMap<String, Payload>;

/// A value attached to a log entry.
#[derive(Debug, Clone, Default)]
pub enum Payload {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    BigInt(i128),
    Date(DateTime<Utc>),
    Error(ErrorValue),
    Array(ArrayRef),
    Object(ObjectRef),
    Custom(Arc<dyn ToPayload>),
}

impl Payload {
    /// Build a fresh object payload from key/value pairs.
    pub fn object<I, K, V>(fields: I) -> Payload
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Payload>,
    {
        Payload::Object(ObjectRef::from_fields(
            fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ))
    }

    /// Wrap a self-converting value.
    pub fn custom<T: ToPayload + 'static>(value: T) -> Payload {
        Payload::Custom(Arc::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Payload::Null)
    }
}

/// A value that knows how to present itself as a [`Payload`].
///
/// This is the hook for types whose log representation differs from
/// their fields (think `toJSON`). The pipeline calls [`to_payload`] when it
/// stringifies the entry; if that fails, it falls back to [`fields`].
///
/// [`to_payload`]: ToPayload::to_payload
/// [`fields`]: ToPayload::fields
pub trait ToPayload: fmt::Debug + Send + Sync {
    fn to_payload(&self) -> Result<Payload, AdapterError>;

    /// Own fields, used when [`ToPayload::to_payload`] fails.
    fn fields(&self) -> Fields {
        Fields::new()
    }
}

/// Shared, mutable object storage.
#[derive(Clone, Default)]
pub struct ObjectRef(Arc<RwLock<Fields>>);

impl ObjectRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: Fields) -> Self {
        Self(Arc::new(RwLock::new(fields)))
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<Payload>) -> Option<Payload> {
        self.0.write().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Payload> {
        self.0.write().remove(key)
    }

    pub fn get(&self, key: &str) -> Option<Payload> {
        self.0.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Copy of the current fields. Nested references stay shared.
    pub fn snapshot(&self) -> Fields {
        self.0.read().clone()
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Fields are not printed: the graph may be cyclic.
        f.debug_struct("ObjectRef")
            .field("id", &format_args!("{:#x}", self.identity()))
            .field("len", &self.len())
            .finish()
    }
}

/// Shared, mutable array storage.
#[derive(Clone, Default)]
pub struct ArrayRef(Arc<RwLock<Vec<Payload>>>);

impl ArrayRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(items: Vec<Payload>) -> Self {
        Self(Arc::new(RwLock::new(items)))
    }

    pub fn push(&self, value: impl Into<Payload>) {
        self.0.write().push(value.into());
    }

    pub fn clear(&self) {
        self.0.write().clear();
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<Payload> {
        self.0.read().clone()
    }

    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayRef")
            .field("id", &format_args!("{:#x}", self.identity()))
            .field("len", &self.len())
            .finish()
    }
}

/// An error captured as data.
#[derive(Debug, Clone)]
pub struct ErrorValue {
    pub name: String,
    pub message: String,
    pub cause: Option<Box<Payload>>,
    pub stack: Option<String>,
}

impl ErrorValue {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), message: message.into(), cause: None, stack: None }
    }

    pub fn with_cause(mut self, cause: impl Into<Payload>) -> Self {
        self.cause = Some(Box::new(cause.into()));
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Capture a typed error. `name` is the error's type name; the
    /// `source()` chain becomes nested causes.
    pub fn from_error<E: Error + 'static>(err: &E) -> Self {
        let mut value = Self::from_dyn(err);
        value.name = short_type_name(std::any::type_name::<E>()).to_string();
        value
    }

    /// Capture a type-erased error. The concrete type is unknown, so the
    /// name is `"Error"`.
    pub fn from_dyn(err: &(dyn Error + 'static)) -> Self {
        Self {
            name: "Error".to_string(),
            message: err.to_string(),
            cause: err.source().map(|source| Box::new(Payload::Error(Self::from_dyn(source)))),
            stack: None,
        }
    }
}

fn short_type_name(full: &str) -> &str {
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::").next().unwrap_or(path)
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Payload::Bool(value)
    }
}

macro_rules! from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Payload {
                fn from(value: $ty) -> Self {
                    Payload::Number(Number::from(value))
                }
            }
        )*
    };
}

from_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl From<f64> for Payload {
    /// Non-finite floats have no JSON form and become `Null`.
    fn from(value: f64) -> Self {
        Number::from_f64(value).map(Payload::Number).unwrap_or(Payload::Null)
    }
}

impl From<f32> for Payload {
    fn from(value: f32) -> Self {
        Payload::from(f64::from(value))
    }
}

impl From<i128> for Payload {
    fn from(value: i128) -> Self {
        Payload::BigInt(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::String(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::String(value)
    }
}

impl From<DateTime<Utc>> for Payload {
    fn from(value: DateTime<Utc>) -> Self {
        Payload::Date(value)
    }
}

impl From<ErrorValue> for Payload {
    fn from(value: ErrorValue) -> Self {
        Payload::Error(value)
    }
}

impl From<ObjectRef> for Payload {
    fn from(value: ObjectRef) -> Self {
        Payload::Object(value)
    }
}

impl From<ArrayRef> for Payload {
    fn from(value: ArrayRef) -> Self {
        Payload::Array(value)
    }
}

impl<T: Into<Payload>> From<Option<T>> for Payload {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Payload::Null)
    }
}

impl<T: Into<Payload>> From<Vec<T>> for Payload {
    fn from(value: Vec<T>) -> Self {
        Payload::Array(ArrayRef::from_vec(value.into_iter().map(Into::into).collect()))
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Payload::Null,
            Value::Bool(b) => Payload::Bool(b),
            Value::Number(n) => Payload::Number(n),
            Value::String(s) => Payload::String(s),
            Value::Array(items) => Payload::from(items),
            Value::Object(map) => Payload::object(map),
        }
    }
}
