//! Frame entity: one message cut from the stream body

use serde_json::Value;

/// One newline-delimited message read from the stream
///
/// Owned by the read loop for the duration of one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A line that decoded as JSON
    Message {
        /// Decoded JSON value
        value: Value,
        /// Length of the line on the wire, delimiter excluded
        raw_len: usize,
    },
    /// A line that failed to decode; reported to the caller as an error
    Malformed {
        /// The offending line, lossily converted to UTF-8
        raw: String,
        /// Decoder error description
        reason: String,
    },
}

impl Frame {
    /// Decode a single line (delimiter already stripped)
    pub fn decode(line: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(line) {
            Ok(value) => Frame::Message {
                value,
                raw_len: line.len(),
            },
            Err(err) => Frame::Malformed {
                raw: String::from_utf8_lossy(line).into_owned(),
                reason: err.to_string(),
            },
        }
    }

    /// Length of the frame on the wire
    pub fn raw_len(&self) -> usize {
        match self {
            Frame::Message { raw_len, .. } => *raw_len,
            Frame::Malformed { raw, .. } => raw.len(),
        }
    }

    /// True when the frame failed to decode
    pub fn is_malformed(&self) -> bool {
        matches!(self, Frame::Malformed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_valid_line() {
        let frame = Frame::decode(br#"{"interaction":{"id":1}}"#);
        assert_eq!(
            frame,
            Frame::Message {
                value: json!({"interaction": {"id": 1}}),
                raw_len: 24,
            }
        );
    }

    #[test]
    fn test_decode_malformed_line() {
        let frame = Frame::decode(b"{\"interaction\":");
        assert!(frame.is_malformed());
        assert_eq!(frame.raw_len(), 15);
        match frame {
            Frame::Malformed { raw, .. } => assert_eq!(raw, "{\"interaction\":"),
            other => panic!("expected malformed frame, got {other:?}"),
        }
    }
}
