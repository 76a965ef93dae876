//! Protocol errors and server error bodies.

use serde_json::{Map, Value};
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding protocol records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The record could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),

    /// The body did not match the expected record shape.
    #[error("decode error: {0}")]
    Decode(String),
}

/// A single validation error attached to a request field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Field name, `None` for errors not bound to a field.
    pub field: Option<String>,
    /// Human-readable message.
    pub message: String,
}

/// A parsed error body returned by the server.
///
/// The server reports failures either as `{"detail": "..."}` or as a map of
/// field names to message lists, e.g. `{"username": ["already taken"]}`.
/// `non_field_errors` entries are kept with no field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorBody {
    /// Top-level `detail` message, if any.
    pub detail: Option<String>,
    /// Field errors in the order the server listed them.
    pub field_errors: Vec<FieldError>,
}

impl ErrorBody {
    /// Creates a body carrying only a `detail` message.
    pub fn detail(message: impl Into<String>) -> Self {
        Self {
            detail: Some(message.into()),
            field_errors: Vec::new(),
        }
    }

    /// Creates a body carrying a single field error.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            detail: None,
            field_errors: vec![FieldError {
                field: Some(field.into()),
                message: message.into(),
            }],
        }
    }

    /// Parses an error body. Returns `None` when the body is not a JSON object.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let value: Value = serde_json::from_slice(bytes).ok()?;
        let map = value.as_object()?;

        let mut body = ErrorBody::default();
        for (key, value) in map {
            if key == "detail" {
                body.detail = value.as_str().map(str::to_string);
                continue;
            }

            let field = (key != "non_field_errors").then(|| key.clone());
            for message in messages_of(value) {
                body.field_errors.push(FieldError {
                    field: field.clone(),
                    message,
                });
            }
        }

        Some(body)
    }

    /// Returns the first field error if present, otherwise the detail message.
    pub fn first_error(&self) -> Option<FieldError> {
        self.field_errors.first().cloned().or_else(|| {
            self.detail.as_ref().map(|message| FieldError {
                field: None,
                message: message.clone(),
            })
        })
    }

    /// Encodes the body as JSON.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut map = Map::new();
        if let Some(detail) = &self.detail {
            map.insert("detail".into(), Value::String(detail.clone()));
        }
        for error in &self.field_errors {
            let key = error
                .field
                .clone()
                .unwrap_or_else(|| "non_field_errors".into());
            let entry = map.entry(key).or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(list) = entry {
                list.push(Value::String(error.message.clone()));
            }
        }
        Value::Object(map).to_string().into_bytes()
    }
}

fn messages_of(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}
