//! Wire envelope
//!
//! Every socket frame is a JSON object `{event, data}`. Binary CRDT
//! updates travel inside `data` as plain number arrays, matching what
//! browser clients emit.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    /// Socket to skip during room fan-out. Never crosses the wire;
    /// forwarders drop the frame for the matching socket.
    #[serde(skip)]
    pub exclude_socket: Option<uuid::Uuid>,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            exclude_socket: None,
        }
    }

    /// Mark a frame as peers-only, skipping the given socket.
    pub fn excluding(mut self, socket_id: uuid::Uuid) -> Self {
        self.exclude_socket = Some(socket_id);
        self
    }

    /// The `error {message}` frame sent to an offending client.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new("error", serde_json::json!({ "message": message.into() }))
    }

    pub fn to_json(&self) -> String {
        // Envelope is plain {String, Value}; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| "{\"event\":\"error\"}".to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Decode a `number[]` payload field into bytes. Any element outside
/// 0..=255 rejects the whole payload; dropping bytes would silently
/// corrupt a CRDT update.
pub fn bytes_from_json(value: &Value) -> Option<Vec<u8>> {
    value.as_array()?.iter().map(byte_from_value).collect()
}

fn byte_from_value(value: &Value) -> Option<u8> {
    value.as_u64().and_then(|v| u8::try_from(v).ok())
}

/// Encode bytes as a `number[]` payload field.
pub fn bytes_to_json(bytes: &[u8]) -> Value {
    Value::Array(bytes.iter().map(|&b| Value::from(b)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_round_trip() {
        let env = Envelope::new("join_document", json!({"documentId": "abc"}));
        let parsed = Envelope::parse(&env.to_json()).unwrap();
        assert_eq!(parsed.event, "join_document");
        assert_eq!(parsed.data["documentId"], "abc");
    }

    #[test]
    fn test_missing_data_defaults_to_null() {
        let parsed = Envelope::parse(r#"{"event":"get_presence"}"#).unwrap();
        assert_eq!(parsed.event, "get_presence");
        assert!(parsed.data.is_null());
    }

    #[test]
    fn test_error_frame_shape() {
        let env = Envelope::error("permission denied");
        assert_eq!(env.event, "error");
        assert_eq!(env.data["message"], "permission denied");
    }

    #[test]
    fn test_bytes_round_trip() {
        let bytes = vec![0u8, 1, 127, 255];
        let json = bytes_to_json(&bytes);
        assert_eq!(bytes_from_json(&json), Some(bytes));
    }

    #[test]
    fn test_bytes_from_non_array() {
        assert_eq!(bytes_from_json(&json!("not-bytes")), None);
    }

    #[test]
    fn test_bytes_with_bad_element_rejected_whole() {
        // a single bad element must not decode to a shorter byte string
        assert_eq!(bytes_from_json(&json!([1, 256, 2])), None);
        assert_eq!(bytes_from_json(&json!([1, -1, 2])), None);
        assert_eq!(bytes_from_json(&json!([1, "2", 3])), None);
        assert_eq!(bytes_from_json(&json!([1, 2.5, 3])), None);
        assert_eq!(bytes_from_json(&json!([])), Some(Vec::new()));
    }
}
