//! Bounded, JSON-safe shaping of arbitrary log arguments.
//!
//! Errors keep `stack`, `message`, `code` and `name` verbatim. Every other
//! property goes through a field reducer that caps its size, so one huge
//! object attached to an error cannot balloon a log line.

use std::fmt;

use serde_json::{Map, Value};

use crate::record::{ErrorValue, LogPart};

/// Cap for reduced strings and stringified fields.
pub const MAX_FIELD_LEN: usize = 300;

/// Cap for fields whose name marks them as likely huge.
pub const MAX_DENYLISTED_LEN: usize = 100;

/// Objects whose JSON form is at most this long are kept as objects.
const INLINE_OBJECT_LEN: usize = 100;

const ELLIPSIS: &str = " ...";

const VERBATIM_KEYS: [&str; 4] = ["stack", "message", "code", "name"];

const DENYLISTED_KEYS: [&str; 3] = ["config", "request", "response"];

/// Flags controlling the output shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Return error-likes as a plain mapping instead of an error value
    pub as_object: bool,
    /// Always produce a (truncated) JSON string
    pub force_stringify: bool,
}

impl NormalizeOptions {
    /// Mapping output, used for file lines.
    pub fn object() -> Self {
        Self {
            as_object: true,
            force_stringify: false,
        }
    }
}

/// Result of normalizing one log argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Text(String),
    Object(Map<String, Value>),
    Error(NormalizedError),
    Value(Value),
}

impl Normalized {
    /// Single-line rendering: text as-is, everything else as compact JSON.
    pub fn to_line(&self) -> String {
        match self {
            Normalized::Text(s) => s.clone(),
            Normalized::Object(map) => compact(&Value::Object(map.clone())),
            Normalized::Error(err) => compact(&Value::Object(err.fields.clone())),
            Normalized::Value(v) => compact(v),
        }
    }

    /// Multi-line rendering for the console.
    pub fn to_pretty(&self) -> String {
        match self {
            Normalized::Text(s) => s.clone(),
            Normalized::Object(map) => pretty(&Value::Object(map.clone())),
            Normalized::Error(err) => err.to_pretty(),
            Normalized::Value(v) => pretty(v),
        }
    }
}

/// An error-shaped normalization result. Carries the same fields as the
/// mapping form but can be used wherever a `std::error::Error` is expected.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedError {
    fields: Map<String, Value>,
}

impl NormalizedError {
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    fn str_field(&self, key: &str) -> &str {
        self.fields.get(key).and_then(Value::as_str).unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        match self.str_field("name") {
            "" => "Error",
            name => name,
        }
    }

    pub fn message(&self) -> &str {
        self.str_field("message")
    }

    pub fn stack(&self) -> &str {
        self.str_field("stack")
    }

    /// Stack first, then any remaining properties as JSON.
    pub fn to_pretty(&self) -> String {
        let mut out = match self.stack() {
            "" => format!("{}: {}", self.name(), self.message()),
            stack => stack.to_string(),
        };
        let rest: Map<String, Value> = self
            .fields
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "stack" | "message" | "name"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if !rest.is_empty() {
            out.push('\n');
            out.push_str(&pretty(&Value::Object(rest)));
        }
        out
    }
}

impl fmt::Display for NormalizedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name(), self.message())
    }
}

impl std::error::Error for NormalizedError {}

/// Normalize one log argument.
pub fn normalize(part: &LogPart, options: NormalizeOptions) -> Normalized {
    let fields = match part {
        // Strings pass through untouched, even when stringifying
        LogPart::Text(s) => return Normalized::Text(s.clone()),
        _ if options.force_stringify => return stringified(part),
        LogPart::Value(Value::Array(_)) => return stringified(part),
        LogPart::Error(err) => reduce_error(err),
        LogPart::Value(Value::Object(map)) => match error_like_properties(map) {
            Some(props) => reduce_properties(props),
            None => return Normalized::Value(Value::Object(map.clone())),
        },
        LogPart::Value(other) => return Normalized::Value(other.clone()),
    };
    if options.as_object {
        Normalized::Object(fields)
    } else {
        Normalized::Error(NormalizedError { fields })
    }
}

fn stringified(part: &LogPart) -> Normalized {
    Normalized::Text(truncate(&compact(&raw_value(part)), MAX_FIELD_LEN))
}

/// Turn anything into an error, for the fatal path: error-likes are reduced,
/// other values become the message of a plain `Error`.
pub fn to_error(part: &LogPart) -> NormalizedError {
    match normalize(part, NormalizeOptions::default()) {
        Normalized::Error(err) => err,
        other => {
            let message = other.to_line();
            NormalizedError {
                fields: reduce_error(&ErrorValue::new("Error", message)),
            }
        }
    }
}

/// Properties of a JSON object that looks like an error: either a wrapper
/// with a `nativeError` object, or a value carrying both `stack` and `message`.
fn error_like_properties(map: &Map<String, Value>) -> Option<Vec<(&String, Option<&Value>)>> {
    if let Some(Value::Object(native)) = map.get("nativeError") {
        return Some(native.iter().map(|(k, v)| (k, Some(v))).collect());
    }
    if map.contains_key("stack") && map.contains_key("message") {
        return Some(map.iter().map(|(k, v)| (k, Some(v))).collect());
    }
    None
}

fn reduce_error(err: &ErrorValue) -> Map<String, Value> {
    reduce_properties(err.properties().iter().map(|(k, v)| (k, v.as_ref())).collect())
}

fn reduce_properties(props: Vec<(&String, Option<&Value>)>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in props {
        let reduced = if VERBATIM_KEYS.contains(&key.as_str()) {
            value.cloned()
        } else {
            reduce_field(key, value)
        };
        match reduced {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) if s.is_empty() => {}
            Some(v) => {
                out.insert(key.clone(), v);
            }
        }
    }
    out
}

/// Bound one non-essential property. `None` means the property is dropped.
pub fn reduce_field(key: &str, value: Option<&Value>) -> Option<Value> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(Value::String(truncate_with_ellipsis(s, MAX_FIELD_LEN))),
        v @ (Value::Number(_) | Value::Bool(_)) => Some(v.clone()),
        v @ (Value::Array(_) | Value::Object(_)) => {
            let json = serde_json::to_string(v).ok()?;
            let denylisted = DENYLISTED_KEYS
                .iter()
                .any(|d| d.eq_ignore_ascii_case(key));
            if denylisted {
                Some(Value::String(truncate_with_ellipsis(&json, MAX_DENYLISTED_LEN)))
            } else if json.chars().count() > INLINE_OBJECT_LEN {
                Some(Value::String(truncate_with_ellipsis(&json, MAX_FIELD_LEN)))
            } else {
                Some(v.clone())
            }
        }
    }
}

/// Cut to at most `max` characters, ending with `" ..."` when cut.
pub fn truncate_with_ellipsis(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(ELLIPSIS.len());
    let mut out: String = s.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn raw_value(part: &LogPart) -> Value {
    match part {
        LogPart::Text(s) => Value::String(s.clone()),
        LogPart::Value(v) => v.clone(),
        LogPart::Error(err) => Value::Object(
            err.properties()
                .iter()
                .filter_map(|(k, v)| v.clone().map(|v| (k.clone(), v)))
                .collect(),
        ),
    }
}

fn compact(v: &Value) -> String {
    serde_json::to_string(v).unwrap_or_default()
}

fn pretty(v: &Value) -> String {
    serde_json::to_string_pretty(v).unwrap_or_default()
}
