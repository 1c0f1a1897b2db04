//! Decoding of inbound frames into validated payloads.
//!
//! Telemetry frames are JSON objects of arbitrary shape. Decoding fails closed:
//! anything that is not a JSON object (arrays, scalars, truncated text, invalid
//! UTF-8) becomes a [`DecodeError`] instead of leaking into consumers.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::transport::Frame;

/// Why a frame could not be decoded.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The frame is not well-formed JSON.
    #[error("malformed JSON: {0}")]
    Malformed(String),
    /// The frame is JSON, but its root is not an object.
    #[error("expected a JSON object, found {found}")]
    NotAnObject {
        /// JSON type of the root value.
        found: &'static str,
    },
    /// A binary frame was not valid UTF-8.
    #[error("binary frame is not valid UTF-8")]
    InvalidUtf8,
}

/// A decoded telemetry payload: a JSON object with string keys.
///
/// The client keeps the most recent one; consumers read fields by key.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TelemetryMessage {
    fields: Map<String, Value>,
}

impl TelemetryMessage {
    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        Self::try_from(value)
    }

    /// Decode any frame. Binary frames must hold UTF-8 JSON text.
    pub fn decode_frame(frame: &Frame) -> Result<Self, DecodeError> {
        match frame {
            Frame::Text(text) => Self::decode(text),
            Frame::Binary(data) => {
                let text = std::str::from_utf8(data).map_err(|_| DecodeError::InvalidUtf8)?;
                Self::decode(text)
            }
        }
    }

    /// Look up a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Look up a nested field by JSON pointer, e.g. `/engine/temperature`.
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        let rest = pointer.strip_prefix('/')?;
        let (head, tail) = match rest.find('/') {
            Some(i) => rest.split_at(i),
            None => (rest, ""),
        };
        let key = head.replace("~1", "/").replace("~0", "~");
        let value = self.fields.get(&key)?;
        if tail.is_empty() {
            Some(value)
        } else {
            value.pointer(tail)
        }
    }

    /// Whether a top-level field is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Number of top-level fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the payload has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over top-level fields.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Convert into a plain JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl TryFrom<Value> for TelemetryMessage {
    type Error = DecodeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(DecodeError::NotAnObject {
                found: json_type_name(&other),
            }),
        }
    }
}

impl From<Map<String, Value>> for TelemetryMessage {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl PartialEq<Value> for TelemetryMessage {
    fn eq(&self, other: &Value) -> bool {
        matches!(other, Value::Object(fields) if *fields == self.fields)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
