//! Message classification
//!
//! Every decoded frame is tagged exactly once, in a fixed priority order:
//! `status` envelopes first, then multi-stream `hash` envelopes, then
//! single-stream `interaction` payloads. Anything else is unknown.

use serde_json::{Map, Value};

use crate::value_objects::StreamHashes;

/// Status values the server uses to report an unrecoverable condition
const FAILURE_STATUSES: &[&str] = &["failure", "error"];

/// Status value for non-fatal server warnings
const WARNING_STATUS: &str = "warning";

/// A decoded frame tagged with its meaning
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedMessage {
    /// A matching interaction
    Interaction {
        /// Interaction body
        payload: Value,
        /// Hash of the stream that matched
        hash: String,
    },
    /// A request to delete a previously delivered interaction
    Deletion {
        /// Deletion notice body
        payload: Value,
        /// Hash of the stream that delivered the original interaction
        hash: String,
    },
    /// An informational status message
    Status {
        /// Value of the `status` field
        name: String,
        /// Remaining fields of the message
        data: Map<String, Value>,
    },
    /// A non-fatal warning from the server
    Warning {
        /// Warning text
        text: String,
    },
    /// An unrecoverable error reported by the server
    Error {
        /// Error text
        text: String,
    },
    /// A message matching none of the known envelopes
    Unknown {
        /// The message as received
        raw: Value,
    },
}

impl ClassifiedMessage {
    /// True for messages that end the current connection
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClassifiedMessage::Error { .. } | ClassifiedMessage::Unknown { .. }
        )
    }

    /// Text reported through `on_error` for fatal messages
    pub fn error_text(&self) -> Option<String> {
        match self {
            ClassifiedMessage::Error { text } => Some(text.clone()),
            ClassifiedMessage::Unknown { raw } => Some(format!("Unhandled data received: {raw}")),
            _ => None,
        }
    }

    /// Short kind name, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifiedMessage::Interaction { .. } => "interaction",
            ClassifiedMessage::Deletion { .. } => "deletion",
            ClassifiedMessage::Status { .. } => "status",
            ClassifiedMessage::Warning { .. } => "warning",
            ClassifiedMessage::Error { .. } => "error",
            ClassifiedMessage::Unknown { .. } => "unknown",
        }
    }
}

/// Classify one decoded JSON value
///
/// `target` supplies the hash reported for single-stream payloads, which do
/// not carry their own.
pub fn classify(value: Value, target: &StreamHashes) -> ClassifiedMessage {
    let mut object = match value {
        Value::Object(object) => object,
        other => return ClassifiedMessage::Unknown { raw: other },
    };

    if let Some(status) = object.remove("status") {
        let name = value_text(&status);
        if FAILURE_STATUSES.contains(&name.as_str()) {
            return ClassifiedMessage::Error {
                text: message_text(&object),
            };
        }
        if name == WARNING_STATUS {
            return ClassifiedMessage::Warning {
                text: message_text(&object),
            };
        }
        return ClassifiedMessage::Status { name, data: object };
    }

    if object.contains_key("hash") {
        let hash = object.get("hash").map(value_text).unwrap_or_default();
        return match object.remove("data") {
            Some(payload @ Value::Object(_)) => {
                let deleted = payload.get("deleted").is_some_and(is_truthy);
                if deleted {
                    ClassifiedMessage::Deletion { payload, hash }
                } else {
                    ClassifiedMessage::Interaction { payload, hash }
                }
            }
            data => {
                if let Some(data) = data {
                    object.insert("data".to_string(), data);
                }
                ClassifiedMessage::Unknown {
                    raw: Value::Object(object),
                }
            }
        };
    }

    if object.contains_key("interaction") {
        let deleted = object.get("deleted").is_some_and(is_truthy);
        let payload = Value::Object(object);
        let hash = target.joined();
        return if deleted {
            ClassifiedMessage::Deletion { payload, hash }
        } else {
            ClassifiedMessage::Interaction { payload, hash }
        };
    }

    ClassifiedMessage::Unknown {
        raw: Value::Object(object),
    }
}

/// JSON truthiness: `false`, `null`, zero, and empty strings, arrays and
/// objects are falsy
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn message_text(object: &Map<String, Value>) -> String {
    object.get("message").map(value_text).unwrap_or_default()
}
