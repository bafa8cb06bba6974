//! JSON codec for cross-frame messages.
//!
//! Wire format: one JSON object per message, carried as a text payload.
//!
//! - Outbound messages are always serialised to a `String` before they reach
//!   the transport; the transport never carries structured data from us.
//! - Inbound payloads may arrive either as text or as an already-structured
//!   value (some senders post objects instead of strings).  Both are accepted.
//!
//! Decoding distinguishes three results:
//!
//! | Result           | Meaning                                      |
//! |------------------|----------------------------------------------|
//! | `Ok(Some(msg))`  | A known message kind, well formed            |
//! | `Ok(None)`       | A message object of a kind we do not handle  |
//! | `Err(_)`         | Not a message at all, or a malformed one     |

use serde_json::Value;
use thiserror::Error;

use super::messages::{InboundMessage, OutboundMessage, KIND_FIELD};

/// Errors that can occur while encoding or decoding cross-frame messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The payload was not valid JSON, or a known message kind had fields of
    /// the wrong shape.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The payload was valid JSON but not an object.
    #[error("message payload is not a JSON object")]
    NotAnObject,

    /// The object has no string `tiki_msg_type` field.
    #[error("message has no `tiki_msg_type` field")]
    MissingKind,
}

/// An inbound payload exactly as the transport delivered it.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundPayload {
    /// A JSON document that still needs parsing.
    Text(String),
    /// A value the platform already deserialised.
    Structured(Value),
}

impl From<String> for InboundPayload {
    fn from(text: String) -> Self {
        InboundPayload::Text(text)
    }
}

impl From<&str> for InboundPayload {
    fn from(text: &str) -> Self {
        InboundPayload::Text(text.to_string())
    }
}

impl From<Value> for InboundPayload {
    fn from(value: Value) -> Self {
        InboundPayload::Structured(value)
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Serialises an outbound message into its single-string wire form.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if serialisation fails.  With the
/// current message types this cannot happen in practice, but the transport
/// boundary keeps the error explicit.
///
/// # Example
///
/// ```rust
/// use tikibar_core::{encode_outbound, OutboundMessage};
///
/// let msg = OutboundMessage::AjaxRequest {
///     url: "/api".into(),
///     verb: "GET".into(),
///     status_code: 200,
///     ms: 250.0,
///     correlation_id: Some("abc123".into()),
/// };
/// let text = encode_outbound(&msg).unwrap();
/// assert!(text.starts_with(r#"{"tiki_msg_type":"ajax_request""#));
/// ```
pub fn encode_outbound(msg: &OutboundMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(msg)?)
}

/// Decodes an inbound payload into a control message.
///
/// Returns `Ok(None)` for message objects whose `tiki_msg_type` is not one of
/// [`InboundMessage::KNOWN_KINDS`].
///
/// # Errors
///
/// - [`ProtocolError::Malformed`] – invalid JSON text, or a known kind with
///   missing / mistyped fields.
/// - [`ProtocolError::NotAnObject`] – the payload is JSON but not an object.
/// - [`ProtocolError::MissingKind`] – the object has no string discriminant.
pub fn decode_inbound(payload: &InboundPayload) -> Result<Option<InboundMessage>, ProtocolError> {
    let value = match payload {
        InboundPayload::Text(text) => serde_json::from_str::<Value>(text)?,
        InboundPayload::Structured(value) => value.clone(),
    };

    let kind = value
        .as_object()
        .ok_or(ProtocolError::NotAnObject)?
        .get(KIND_FIELD)
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingKind)?;

    if !InboundMessage::KNOWN_KINDS.contains(&kind) {
        return Ok(None);
    }

    Ok(Some(serde_json::from_value(value)?))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_height_from_text() {
        let payload = InboundPayload::from(r#"{"tiki_msg_type":"height","height":120}"#);

        let msg = decode_inbound(&payload).unwrap();

        assert_eq!(msg, Some(InboundMessage::Height { height: 120.0 }));
    }

    #[test]
    fn test_decode_height_from_structured_value() {
        let payload = InboundPayload::from(json!({"tiki_msg_type": "height", "height": 80.5}));

        let msg = decode_inbound(&payload).unwrap();

        assert_eq!(msg, Some(InboundMessage::Height { height: 80.5 }));
    }

    #[test]
    fn test_decode_hide_ignores_extra_fields() {
        let payload = InboundPayload::from(r#"{"tiki_msg_type":"hide","reason":"user"}"#);
        assert_eq!(decode_inbound(&payload).unwrap(), Some(InboundMessage::Hide));
    }

    #[test]
    fn test_unknown_kind_is_ignored_not_an_error() {
        let payload = InboundPayload::from(r#"{"tiki_msg_type":"theme","dark":true}"#);
        assert_eq!(decode_inbound(&payload).unwrap(), None);
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let payload = InboundPayload::from("{not json");
        assert!(matches!(decode_inbound(&payload), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_non_object_payload_is_rejected() {
        let payload = InboundPayload::from("[1,2,3]");
        assert!(matches!(decode_inbound(&payload), Err(ProtocolError::NotAnObject)));

        let payload = InboundPayload::from(json!("height"));
        assert!(matches!(decode_inbound(&payload), Err(ProtocolError::NotAnObject)));
    }

    #[test]
    fn test_missing_or_non_string_kind_is_rejected() {
        let payload = InboundPayload::from(r#"{"height":120}"#);
        assert!(matches!(decode_inbound(&payload), Err(ProtocolError::MissingKind)));

        let payload = InboundPayload::from(json!({"tiki_msg_type": 7}));
        assert!(matches!(decode_inbound(&payload), Err(ProtocolError::MissingKind)));
    }

    #[test]
    fn test_known_kind_with_wrong_field_type_is_malformed() {
        let payload = InboundPayload::from(r#"{"tiki_msg_type":"height","height":"tall"}"#);
        assert!(matches!(decode_inbound(&payload), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_encode_produces_single_json_object() {
        let msg = OutboundMessage::AjaxRequest {
            url: "/api".to_string(),
            verb: "POST".to_string(),
            status_code: 201,
            ms: 12.0,
            correlation_id: None,
        };

        let text = encode_outbound(&msg).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();

        assert!(parsed.is_object());
        assert_eq!(parsed["tiki_msg_type"], "ajax_request");
        assert_eq!(parsed["verb"], "POST");
        assert!(parsed["correlation_id"].is_null());
    }
}
