//! Uniform success/error envelope returned by every service boundary.
//!
//! Downstream services build envelopes directly; the gateway additionally
//! runs arbitrary success payloads through [`normalize`] so clients always
//! see the same `{success, message, data, error?}` shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const DEFAULT_SUCCESS_MESSAGE: &str = "Request successful";
pub const OPERATION_SUCCESSFUL: &str = "Operation successful";

/// A human readable message: either one string or an ordered list of
/// strings (multi-field validation failures).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Single(String),
    Many(Vec<String>),
}

impl Message {
    /// Flattens the message into a single line, list entries joined by ", ".
    pub fn joined(&self) -> String {
        match self {
            Message::Single(s) => s.clone(),
            Message::Many(items) => items.join(", "),
        }
    }

    pub fn is_many(&self) -> bool {
        matches!(self, Message::Many(_))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message::Single(s.to_string())
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message::Single(s)
    }
}

impl From<Vec<String>> for Message {
    fn from(items: Vec<String>) -> Self {
        Message::Many(items)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope<T = Value> {
    pub success: bool,
    pub message: Message,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl<T> ResponseEnvelope<T> {
    /// Success envelope with the default message.
    pub fn success(data: T) -> Self {
        Self::success_with(data, DEFAULT_SUCCESS_MESSAGE)
    }

    pub fn success_with(data: T, message: impl Into<Message>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            error: None,
        }
    }

    /// Error envelope carrying an explicit payload.
    pub fn error_with_data(message: impl Into<Message>, error: Option<Value>, data: T) -> Self {
        Self {
            success: false,
            message: message.into(),
            data,
            error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn into_parts(self) -> (bool, Message, T, Option<Value>) {
        (self.success, self.message, self.data, self.error)
    }
}

impl<T: Default> ResponseEnvelope<T> {
    /// Error envelope whose `data` is the zero value of `T`
    /// (`null` for JSON values, `[]` for lists).
    pub fn error(message: impl Into<Message>, error: Option<Value>) -> Self {
        Self::error_with_data(message, error, T::default())
    }
}

/* ---------------- gateway normalisation ---------------- */

/// Wraps any downstream success payload into an envelope.
pub fn normalize(payload: Value) -> ResponseEnvelope<Value> {
    match payload {
        Value::Null => ResponseEnvelope::success_with(Value::Null, OPERATION_SUCCESSFUL),
        Value::String(s) => ResponseEnvelope::success_with(Value::Null, s),
        Value::Object(map) => normalize_object(map),
        other => ResponseEnvelope::success_with(other, OPERATION_SUCCESSFUL),
    }
}

fn normalize_object(mut map: Map<String, Value>) -> ResponseEnvelope<Value> {
    if is_envelope(&map) {
        let success = map.get("success").and_then(Value::as_bool).unwrap_or(true);
        let message = map
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(OPERATION_SUCCESSFUL)
            .to_string();
        let data = map.remove("data").unwrap_or(Value::Null);
        // a successful reply never carries an error
        let error = map.remove("error").filter(|_| !success);
        return ResponseEnvelope {
            success,
            message: Message::Single(message),
            data,
            error,
        };
    }

    if map.is_empty() {
        return ResponseEnvelope::success_with(Value::Object(map), OPERATION_SUCCESSFUL);
    }

    let has_message = map.contains_key("message");
    let has_data = map.contains_key("data");

    match (has_message, has_data) {
        (true, true) => {
            let message = map.remove("message").map(|m| extract_message(&m));
            let data = map.remove("data").unwrap_or(Value::Null);
            let message = message.unwrap_or_else(|| OPERATION_SUCCESSFUL.to_string());
            ResponseEnvelope::success_with(merge_data(data, map), message)
        }
        (true, false) => {
            let message = map
                .remove("message")
                .map(|m| extract_message(&m))
                .unwrap_or_else(|| OPERATION_SUCCESSFUL.to_string());
            let data = if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            };
            ResponseEnvelope::success_with(data, message)
        }
        (false, true) => {
            if has_pagination(&map) {
                return ResponseEnvelope::success_with(Value::Object(map), OPERATION_SUCCESSFUL);
            }
            let data = map.remove("data").unwrap_or(Value::Null);
            ResponseEnvelope::success_with(merge_data(data, map), OPERATION_SUCCESSFUL)
        }
        (false, false) => ResponseEnvelope::success_with(Value::Object(map), OPERATION_SUCCESSFUL),
    }
}

fn is_envelope(map: &Map<String, Value>) -> bool {
    matches!(map.get("success"), Some(Value::Bool(_)))
        && matches!(map.get("message"), Some(Value::String(_)))
        && map.contains_key("data")
}

fn has_pagination(map: &Map<String, Value>) -> bool {
    map.keys().any(|k| k == "meta" || k == "pagination")
}

fn extract_message(message: &Value) -> String {
    match message {
        Value::String(s) if !s.trim().is_empty() => s.clone(),
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            if joined.is_empty() {
                OPERATION_SUCCESSFUL.to_string()
            } else {
                joined
            }
        }
        Value::Object(_) => message.to_string(),
        _ => OPERATION_SUCCESSFUL.to_string(),
    }
}

fn merge_data(data: Value, extras: Map<String, Value>) -> Value {
    if extras.is_empty() {
        return data;
    }
    let paginated = has_pagination(&extras);
    match data {
        Value::Null => Value::Object(extras),
        Value::Array(items) if paginated => {
            let mut out = Map::new();
            out.insert("data".into(), Value::Array(items));
            out.extend(extras);
            Value::Object(out)
        }
        Value::Object(mut fields) => {
            fields.extend(extras);
            Value::Object(fields)
        }
        // primitives and non-paginated arrays keep their own `data` key
        other => {
            let mut out = extras;
            out.insert("data".into(), other);
            Value::Object(out)
        }
    }
}
