//! Wire format: JSON text. Inbound payloads are validated in a fixed order
//! (parseable, authenticated, tagged, actionable) before any field is trusted.

use serde_json::{Map, Value};

use crate::nonce::Nonce;
use crate::protocol::{Action, EmbedMessage, ValidMessage, SOURCE_TAG};

/// Longest received key echoed back in diagnostics.
const MAX_KEY_REPR: usize = 64;

/// Decode and validate one inbound payload against the session `nonce`.
pub fn decode_message(raw: &str, nonce: &Nonce) -> Result<ValidMessage, MessageError> {
    let value: Value = serde_json::from_str(raw).map_err(MessageError::Malformed)?;
    let obj = value.as_object().ok_or(MessageError::NotAnObject)?;

    // Authentication comes first: nothing else is inspected for a foreign key.
    check_key(obj, nonce)?;

    if obj.get("source").and_then(Value::as_str) != Some(SOURCE_TAG) {
        return Err(MessageError::UnknownSource);
    }

    let action = match obj.get("action").and_then(Value::as_str) {
        Some(name) => {
            Action::from_wire(name).ok_or_else(|| MessageError::UnknownAction(Some(name.into())))?
        }
        None => return Err(MessageError::UnknownAction(None)),
    };

    let height = obj
        .get("data")
        .and_then(|data| data.get("height"))
        .and_then(parse_height);

    Ok(ValidMessage { action, height })
}

fn check_key(obj: &Map<String, Value>, nonce: &Nonce) -> Result<(), MessageError> {
    match obj.get("key") {
        None | Some(Value::Null) => Err(MessageError::MissingKey),
        Some(Value::String(key)) if nonce.matches(key) => Ok(()),
        Some(Value::String(key)) => Err(MessageError::KeyMismatch {
            received: key.chars().take(MAX_KEY_REPR).collect(),
        }),
        Some(other) => Err(MessageError::KeyMismatch {
            received: other.to_string().chars().take(MAX_KEY_REPR).collect(),
        }),
    }
}

/// Normalize a reported height to a non-negative integer.
/// Numbers are truncated (negative becomes 0); strings are read as an integer prefix.
fn parse_height(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => {
            let h = n.as_f64()?;
            if !h.is_finite() {
                return None;
            }
            // Float to int casts saturate: negatives land on 0, huge values on u32::MAX.
            Some(h.trunc() as u32)
        }
        Value::String(s) => parse_int_prefix(s),
        _ => None,
    }
}

fn parse_int_prefix(s: &str) -> Option<u32> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits: &str = &digits[..digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len())];
    if digits.is_empty() {
        return None;
    }
    if negative {
        return Some(0);
    }
    let value = digits.bytes().fold(0u64, |acc, b| {
        acc.saturating_mul(10).saturating_add(u64::from(b - b'0'))
    });
    Some(value.min(u64::from(u32::MAX)) as u32)
}

/// Encode a peer-side message as JSON text.
pub fn encode_message(msg: &EmbedMessage) -> Result<String, MessageEncodeError> {
    serde_json::to_string(msg).map_err(MessageEncodeError::Encode)
}

/// Reason an inbound payload was dropped.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("malformed payload: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("payload is not an object")]
    NotAnObject,
    #[error("message carries no key")]
    MissingKey,
    #[error("invalid key {received:?}")]
    KeyMismatch { received: String },
    #[error("unrecognized source tag")]
    UnknownSource,
    #[error("unrecognized action {0:?}")]
    UnknownAction(Option<String>),
}

impl MessageError {
    /// True when the message was addressed with a key other than ours. This can
    /// mean leakage between sibling embeds and is worth a warning; everything
    /// else is routine foreign traffic.
    pub fn is_suspicious(&self) -> bool {
        matches!(self, MessageError::KeyMismatch { .. })
    }
}

/// Error encoding a peer-side message.
#[derive(Debug, thiserror::Error)]
pub enum MessageEncodeError {
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nonce() -> Nonce {
        Nonce::from_string("n0nce")
    }

    fn decode(value: Value) -> Result<ValidMessage, MessageError> {
        decode_message(&value.to_string(), &nonce())
    }

    #[test]
    fn valid_ready_with_height() {
        let msg = decode(json!({
            "key": "n0nce",
            "source": "custom_embed",
            "action": "ready",
            "data": { "height": 500 }
        }))
        .unwrap();
        assert_eq!(msg.action, Action::Ready);
        assert_eq!(msg.height, Some(500));
    }

    #[test]
    fn encoded_peer_message_decodes() {
        let raw = encode_message(&EmbedMessage::resize("n0nce", 120)).unwrap();
        let msg = decode_message(&raw, &nonce()).unwrap();
        assert_eq!(msg.action, Action::Resize);
        assert_eq!(msg.height, Some(120));
    }

    #[test]
    fn malformed_text_is_rejected() {
        for raw in ["", "not json", "{\"key\":", "{'key': 'n0nce'}"] {
            assert!(matches!(
                decode_message(raw, &nonce()),
                Err(MessageError::Malformed(_))
            ));
        }
    }

    #[test]
    fn non_object_is_rejected() {
        for value in [json!(null), json!(5), json!("ready"), json!(["n0nce"])] {
            assert!(matches!(decode(value), Err(MessageError::NotAnObject)));
        }
    }

    #[test]
    fn missing_key_differs_from_mismatch() {
        let missing = decode(json!({ "source": "custom_embed", "action": "ready" }));
        assert!(matches!(missing, Err(MessageError::MissingKey)));
        let null_key = decode(json!({ "key": null, "source": "custom_embed", "action": "ready" }));
        assert!(matches!(null_key, Err(MessageError::MissingKey)));

        let wrong = decode(json!({ "key": "wrong", "source": "custom_embed", "action": "ready" }));
        match wrong {
            Err(MessageError::KeyMismatch { received }) => assert_eq!(received, "wrong"),
            other => panic!("expected KeyMismatch, got {other:?}"),
        }
        let numeric = decode(json!({ "key": 42, "source": "custom_embed", "action": "ready" }));
        assert!(matches!(numeric, Err(MessageError::KeyMismatch { .. })));
    }

    #[test]
    fn key_is_checked_before_other_fields() {
        // Wrong key and wrong source: the key failure wins.
        let err = decode(json!({ "key": "other", "source": "someone_else", "action": "nope" }))
            .unwrap_err();
        assert!(err.is_suspicious());
    }

    #[test]
    fn foreign_source_is_rejected() {
        let err = decode(json!({ "key": "n0nce", "source": "devtools", "action": "ready" }))
            .unwrap_err();
        assert!(matches!(err, MessageError::UnknownSource));
        assert!(!err.is_suspicious());
        let err = decode(json!({ "key": "n0nce", "action": "ready" })).unwrap_err();
        assert!(matches!(err, MessageError::UnknownSource));
    }

    #[test]
    fn unknown_action_is_rejected() {
        let err = decode(json!({ "key": "n0nce", "source": "custom_embed", "action": "close" }))
            .unwrap_err();
        assert!(matches!(err, MessageError::UnknownAction(Some(ref a)) if a == "close"));
        let err = decode(json!({ "key": "n0nce", "source": "custom_embed" })).unwrap_err();
        assert!(matches!(err, MessageError::UnknownAction(None)));
    }

    #[test]
    fn height_normalization() {
        let cases = [
            (json!(0), Some(0)),
            (json!(320.9), Some(320)),
            (json!(-40), Some(0)),
            (json!("320px"), Some(320)),
            (json!("  77"), Some(77)),
            (json!("-5"), Some(0)),
            (json!("tall"), None),
            (json!(true), None),
            (json!(null), None),
            (json!(1e12), Some(u32::MAX)),
        ];
        for (height, expected) in cases {
            let msg = decode(json!({
                "key": "n0nce",
                "source": "custom_embed",
                "action": "ready",
                "data": { "height": height.clone() }
            }))
            .unwrap();
            assert_eq!(msg.height, expected, "height {height}");
        }
    }

    #[test]
    fn missing_or_odd_data_has_no_height() {
        let msg = decode(json!({ "key": "n0nce", "source": "custom_embed", "action": "ready" }))
            .unwrap();
        assert_eq!(msg.height, None);
        let msg = decode(json!({
            "key": "n0nce",
            "source": "custom_embed",
            "action": "ready",
            "data": 7
        }))
        .unwrap();
        assert_eq!(msg.height, None);
    }
}
