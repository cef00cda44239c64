//! Stream Codec
//!
//! Splits inbound text frames into event batches and single control
//! objects. Element-level validation is left to the normalizer so that one
//! bad element never costs the rest of its batch.

use serde_json::Value;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Frame is not valid JSON.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame is valid JSON but neither an array nor an object.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// A decoded text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// JSON array of events.
    Batch(Vec<Value>),
    /// Single JSON object (control message).
    Control(Value),
}

/// Decode a text frame.
///
/// # Errors
///
/// Returns an error if the text is not JSON or is a JSON scalar.
pub fn decode(text: &str) -> Result<Frame, CodecError> {
    match serde_json::from_str::<Value>(text.trim())? {
        Value::Array(events) => Ok(Frame::Batch(events)),
        object @ Value::Object(_) => Ok(Frame::Control(object)),
        other => {
            let preview: String = other.to_string().chars().take(50).collect();
            Err(CodecError::InvalidFormat(format!(
                "expected JSON array or object, got: {preview}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_batch() {
        let frame = decode(r#"[{"ev":"T","sym":"AAPL","p":1.5},{"ev":"Q"}]"#).unwrap();
        let Frame::Batch(events) = frame else {
            panic!("expected batch");
        };
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], json!({"ev": "Q"}));
    }

    #[test]
    fn decodes_empty_batch() {
        assert_eq!(decode("[]").unwrap(), Frame::Batch(vec![]));
    }

    #[test]
    fn decodes_single_object_as_control() {
        let frame = decode(r#"  {"ev":"status","status":"connected"}  "#).unwrap();
        assert!(matches!(frame, Frame::Control(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(decode("[{\"ev\":"), Err(CodecError::Json(_))));
    }

    #[test]
    fn rejects_scalars() {
        assert!(matches!(decode("42"), Err(CodecError::InvalidFormat(_))));
        assert!(matches!(decode("\"hello\""), Err(CodecError::InvalidFormat(_))));
    }
}
