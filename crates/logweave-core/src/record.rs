//! Log records and the values they carry.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::severity::Severity;

/// One argument of a log call.
#[derive(Debug, Clone, PartialEq)]
pub enum LogPart {
    /// Plain text, written as-is
    Text(String),
    /// Any JSON-shaped value (objects, arrays, scalars)
    Value(Value),
    /// An error with diagnostic properties
    Error(ErrorValue),
}

impl LogPart {
    /// Serialize anything into a part. Values that cannot be serialized
    /// become `null`, which every sink drops.
    pub fn json<T: Serialize>(value: &T) -> Self {
        LogPart::Value(serde_json::to_value(value).unwrap_or(Value::Null))
    }

    /// Whether the part carries nothing worth writing (`null` or `""`).
    pub fn is_blank(&self) -> bool {
        match self {
            LogPart::Text(s) => s.is_empty(),
            LogPart::Value(Value::Null) => true,
            LogPart::Value(Value::String(s)) => s.is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for LogPart {
    fn from(s: &str) -> Self {
        LogPart::Text(s.to_string())
    }
}

impl From<String> for LogPart {
    fn from(s: String) -> Self {
        LogPart::Text(s)
    }
}

impl From<Value> for LogPart {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => LogPart::Text(s),
            other => LogPart::Value(other),
        }
    }
}

impl From<ErrorValue> for LogPart {
    fn from(e: ErrorValue) -> Self {
        LogPart::Error(e)
    }
}

/// An error-like value: an ordered bag of properties that always contains a
/// `name`, a `message` and a `stack`.
///
/// A property whose value could not be serialized is kept as `None` so the
/// normalizer can drop it.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorValue {
    properties: Vec<(String, Option<Value>)>,
}

impl ErrorValue {
    /// Create an error with the given name and message. The stack is the
    /// `name: message` header line.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        let name = name.into();
        let message = message.into();
        let stack = format!("{}: {}", name, message);
        Self {
            properties: vec![
                ("stack".to_string(), Some(Value::String(stack))),
                ("message".to_string(), Some(Value::String(message))),
                ("name".to_string(), Some(Value::String(name))),
            ],
        }
    }

    /// Capture a Rust error. The name is the error's type name, the stack is
    /// the `source()` chain.
    pub fn from_error<E: std::error::Error + 'static>(err: &E) -> Self {
        let full = std::any::type_name::<E>();
        let name = full.rsplit("::").next().unwrap_or(full);
        Self::capture(name, err)
    }

    /// Capture a type-erased error.
    pub fn from_dyn_error(err: &(dyn std::error::Error + 'static)) -> Self {
        Self::capture("Error", err)
    }

    fn capture(name: &str, err: &(dyn std::error::Error + 'static)) -> Self {
        let mut value = Self::new(name, err.to_string());
        let mut stack = format!("{}: {}", name, err);
        let mut source = err.source();
        while let Some(cause) = source {
            stack.push_str(&format!("\n    caused by: {}", cause));
            source = cause.source();
        }
        value.set("stack", Some(Value::String(stack)));
        value
    }

    /// Set the `code` property.
    pub fn with_code(self, code: impl Serialize) -> Self {
        self.with_property("code", code)
    }

    /// Set or replace an arbitrary property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).ok();
        self.set(&key.into(), value);
        self
    }

    fn set(&mut self, key: &str, value: Option<Value>) {
        match self.properties.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.properties.push((key.to_string(), value)),
        }
    }

    /// All properties in insertion order.
    pub fn properties(&self) -> &[(String, Option<Value>)] {
        &self.properties
    }

    /// Look up a property.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_ref())
    }

    /// The `message` property.
    pub fn message(&self) -> &str {
        self.get("message").and_then(Value::as_str).unwrap_or_default()
    }
}

/// A single log call, captured at the call site.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub parts: Vec<LogPart>,
    pub trace_id: Option<String>,
}

impl LogRecord {
    /// Create a record stamped with the given time.
    pub fn new(severity: Severity, timestamp: DateTime<Utc>, parts: Vec<LogPart>) -> Self {
        Self {
            severity,
            timestamp,
            parts,
            trace_id: None,
        }
    }

    /// Attach a correlation id.
    pub fn with_trace_id(mut self, trace_id: Option<String>) -> Self {
        self.trace_id = trace_id;
        self
    }
}
