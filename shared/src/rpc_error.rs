//! Wire shape of a failure reported by a downstream service to the gateway.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::envelope::{Message, ResponseEnvelope};

const FALLBACK_MESSAGE: &str = "An error occurred";

/// Failure payload carried over the internal channel.
///
/// Serialized as `{statusCode, message, error, timestamp?}`; `message` keeps
/// whichever form (string or list) it was created with. Values are never
/// mutated once built, hence the private fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcError {
    status_code: u16,
    message: Message,
    #[serde(default)]
    error: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

impl RpcError {
    /// Builds an error stamped with the current UTC time.
    pub fn new(status_code: u16, message: impl Into<Message>, error: impl Into<Value>) -> Self {
        Self {
            status_code,
            message: message.into(),
            error: error.into(),
            timestamp: Some(now_iso8601()),
        }
    }

    pub fn without_timestamp(
        status_code: u16,
        message: impl Into<Message>,
        error: impl Into<Value>,
    ) -> Self {
        Self {
            status_code,
            message: message.into(),
            error: error.into(),
            timestamp: None,
        }
    }

    /// Connection refused or upstream timeout.
    pub fn service_unavailable() -> Self {
        Self::new(503, "Service temporarily unavailable", "ServiceUnavailable")
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn error(&self) -> &Value {
        &self.error
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    /// Outward transport status. Anything that is not an error status
    /// collapses to 500 so a failure never leaves as a success.
    pub fn status(&self) -> u16 {
        if (400..=599).contains(&self.status_code) {
            self.status_code
        } else {
            500
        }
    }

    /// Gateway re-wrap: the message heads the envelope, everything else of
    /// the error travels in `error`.
    pub fn into_envelope(self) -> ResponseEnvelope<Value> {
        let mut detail = Map::new();
        detail.insert("statusCode".into(), json!(self.status_code));
        detail.insert("error".into(), self.error);
        if let Some(ts) = self.timestamp {
            detail.insert("timestamp".into(), Value::String(ts));
        }
        ResponseEnvelope::error(self.message, Some(Value::Object(detail)))
    }

    /// Decodes a non-2xx body received from a downstream service.
    pub fn from_upstream(status: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(value) => Self::from_upstream_value(status, value),
            Err(_) => {
                let text = String::from_utf8_lossy(body).trim().to_string();
                let message = if text.is_empty() {
                    FALLBACK_MESSAGE.to_string()
                } else {
                    text
                };
                Self::new(status, message, "InternalServerError")
            }
        }
    }

    pub fn from_upstream_value(status: u16, value: Value) -> Self {
        let Value::Object(map) = value else {
            return match value {
                Value::String(s) if !s.trim().is_empty() => {
                    Self::new(status, s, "InternalServerError")
                }
                _ => Self::new(status, FALLBACK_MESSAGE, "InternalServerError"),
            };
        };

        if is_rpc_error(&map) {
            if let Ok(parsed) = serde_json::from_value::<RpcError>(Value::Object(map.clone())) {
                return parsed;
            }
        }

        // framework-style HTTP error: {status, response: {message, error}}
        if map.contains_key("status") && map.contains_key("response") {
            let code = status_from(map.get("status")).unwrap_or(status);
            let response = map.get("response").cloned().unwrap_or(Value::Null);
            let message = message_from(response.get("message"))
                .or_else(|| message_from(map.get("message")))
                .unwrap_or_else(|| FALLBACK_MESSAGE.into());
            let error = response
                .get("error")
                .cloned()
                .or_else(|| map.get("name").cloned())
                .unwrap_or_else(|| json!("InternalServerError"));
            return Self::new(code, message, error);
        }

        let code = status_from(map.get("statusCode")).unwrap_or(status);
        let message = message_from(map.get("message")).unwrap_or_else(|| FALLBACK_MESSAGE.into());
        let error = match map.get("error") {
            Some(Value::Null) | None => json!("InternalServerError"),
            Some(other) => other.clone(),
        };
        let timestamp = map
            .get("timestamp")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(now_iso8601);
        Self {
            status_code: code,
            message,
            error,
            timestamp: Some(timestamp),
        }
    }
}

impl From<RpcError> for ResponseEnvelope<Value> {
    fn from(err: RpcError) -> Self {
        err.into_envelope()
    }
}

fn is_rpc_error(map: &Map<String, Value>) -> bool {
    map.get("statusCode").map(Value::is_u64).unwrap_or(false)
        && message_from(map.get("message")).is_some()
        && map.contains_key("error")
}

fn status_from(value: Option<&Value>) -> Option<u16> {
    value
        .and_then(Value::as_u64)
        .and_then(|v| u16::try_from(v).ok())
        .filter(|v| *v > 0)
}

fn message_from(value: Option<&Value>) -> Option<Message> {
    match value? {
        Value::String(s) => Some(Message::Single(s.clone())),
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map(Message::Many),
        _ => None,
    }
}

pub(crate) fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_keeps_scalar_message() {
        let err = RpcError::new(404, "Exam with ID 3 not found", "NotFound");
        let text = serde_json::to_string(&err).unwrap();
        let back: RpcError = serde_json::from_str(&text).unwrap();
        assert_eq!(back, err);
        assert!(!back.message().is_many());
        assert!(text.contains("\"statusCode\":404"));
    }

    #[test]
    fn round_trip_keeps_list_message() {
        let err = RpcError::without_timestamp(
            400,
            vec!["email must be an email".to_string()],
            json!({"fields": ["email"]}),
        );
        let back: RpcError = serde_json::from_slice(&serde_json::to_vec(&err).unwrap()).unwrap();
        assert_eq!(back, err);
        assert!(back.message().is_many());
        assert!(back.timestamp().is_none());
    }

    #[test]
    fn gateway_rewrap_preserves_message_list() {
        let body = json!({
            "statusCode": 422,
            "message": ["class_id must be an integer"],
            "error": {"field": "class_id"}
        });
        let err = RpcError::from_upstream(422, body.to_string().as_bytes());
        assert_eq!(err.status(), 422);
        let env = serde_json::to_value(err.into_envelope()).unwrap();
        assert_eq!(
            env,
            json!({
                "success": false,
                "message": ["class_id must be an integer"],
                "data": null,
                "error": {"statusCode": 422, "error": {"field": "class_id"}}
            })
        );
    }

    #[test]
    fn http_like_error_is_coerced() {
        let body = json!({
            "status": 409,
            "response": {"message": "duplicate", "error": "Conflict"}
        });
        let err = RpcError::from_upstream_value(500, body);
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.message().joined(), "duplicate");
        assert_eq!(err.error(), &json!("Conflict"));
    }

    #[test]
    fn unparseable_body_uses_transport_status() {
        let err = RpcError::from_upstream(502, b"Bad Gateway");
        assert_eq!(err.status(), 502);
        assert_eq!(err.message().joined(), "Bad Gateway");
        assert_eq!(err.error(), &json!("InternalServerError"));
        assert!(err.timestamp().is_some());
    }

    #[test]
    fn non_error_status_falls_back_to_500() {
        assert_eq!(RpcError::new(200, "odd", "x").status(), 500);
        assert_eq!(RpcError::new(0, "odd", "x").status(), 500);
        assert_eq!(RpcError::service_unavailable().status(), 503);
    }
}
