//! Inbound and outbound message shapes
//!
//! Inbound payloads arrive in whatever shape the remote platform uses. They
//! are normalized here once so that nothing downstream ever has to reject a
//! message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::utils::clip_chars;

/// Longest inbound text kept, in characters
pub const MAX_INBOUND_CHARS: usize = 4000;

const TEXT_KEYS: &[&str] = &["message", "text", "input", "data", "msg"];
const SESSION_KEYS: &[&str] = &["session_id", "sessionId", "sid"];
const NESTED_TEXT_KEYS: &[&str] = &["text", "content"];

/// Message received from the remote party
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Session identifier supplied by the caller, if any
    pub session_id: Option<String>,
    /// Message text content
    pub text: String,
    /// Message timestamp
    pub timestamp: DateTime<Utc>,
    /// Any payload fields that were not consumed
    pub metadata: HashMap<String, Value>,
}

impl InboundMessage {
    /// Create a new inbound message
    pub fn new(session_id: Option<String>, text: impl Into<String>) -> Self {
        Self {
            session_id: session_id.and_then(non_blank),
            text: normalize_inbound_text(&text.into()),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Build a message from a decoded JSON payload of any shape
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::from_object(map),
            Value::Null => Self::new(None, ""),
            Value::String(s) => Self::new(None, s),
            other => Self::new(None, other.to_string()),
        }
    }

    /// Build a message from a raw request body. JSON bodies go through
    /// [`InboundMessage::from_value`]; anything else is taken as plain text.
    pub fn from_body(body: &[u8]) -> Self {
        let raw = String::from_utf8_lossy(body);
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::new(None, "");
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => Self::from_value(value),
            Err(_) => Self::new(None, trimmed),
        }
    }

    /// Fill in the session id when the payload did not carry one
    pub fn or_session_id(mut self, session_id: Option<String>) -> Self {
        if self.session_id.is_none() {
            self.session_id = session_id.and_then(non_blank);
        }
        self
    }

    /// Add metadata to the message
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    fn from_object(mut map: Map<String, Value>) -> Self {
        let session_id = SESSION_KEYS
            .iter()
            .find_map(|key| map.remove(*key).and_then(scalar_to_string));

        let text = TEXT_KEYS
            .iter()
            .find_map(|key| map.remove(*key).and_then(extract_text))
            .unwrap_or_default();

        let mut message = Self::new(session_id, text);
        message.metadata = map.into_iter().collect();
        message
    }
}

/// Reply returned to the remote party
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundReply {
    pub reply: String,
    pub session_id: String,
    pub ended: bool,
}

impl OutboundReply {
    pub fn new(reply: impl Into<String>, session_id: impl Into<String>, ended: bool) -> Self {
        Self {
            reply: reply.into(),
            session_id: session_id.into(),
            ended,
        }
    }
}

fn non_blank(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn normalize_inbound_text(text: &str) -> String {
    clip_chars(text.trim(), MAX_INBOUND_CHARS)
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => non_blank(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn extract_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Object(mut inner) => NESTED_TEXT_KEYS
            .iter()
            .find_map(|key| inner.remove(*key).and_then(extract_text)),
        Value::Array(_) => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_reads_alternate_keys() {
        let msg = InboundMessage::from_value(json!({"sid": "abc", "msg": "  hi there "}));
        assert_eq!(msg.session_id.as_deref(), Some("abc"));
        assert_eq!(msg.text, "hi there");

        let msg = InboundMessage::from_value(json!({"sessionId": 42, "input": "yo"}));
        assert_eq!(msg.session_id.as_deref(), Some("42"));
        assert_eq!(msg.text, "yo");
    }

    #[test]
    fn test_from_value_nested_message_and_metadata() {
        let msg = InboundMessage::from_value(json!({
            "session_id": "s-1",
            "message": {"sender": "scammer", "text": "send the otp"},
            "channel": "sms"
        }));
        assert_eq!(msg.text, "send the otp");
        assert_eq!(msg.metadata.get("channel"), Some(&json!("sms")));
        assert!(!msg.metadata.contains_key("session_id"));
    }

    #[test]
    fn test_from_value_stringifies_scalars() {
        let msg = InboundMessage::from_value(json!({"text": 1234}));
        assert_eq!(msg.text, "1234");
        let msg = InboundMessage::from_value(json!(true));
        assert_eq!(msg.text, "true");
    }

    #[test]
    fn test_from_body_plain_text_and_garbage() {
        let msg = InboundMessage::from_body(b"not json at all");
        assert_eq!(msg.text, "not json at all");
        assert!(msg.session_id.is_none());

        let msg = InboundMessage::from_body(&[0xff, 0xfe, b'h', b'i']);
        assert!(msg.text.ends_with("hi"));

        let msg = InboundMessage::from_body(b"   ");
        assert_eq!(msg.text, "");
    }

    #[test]
    fn test_blank_session_id_is_dropped() {
        let msg = InboundMessage::from_value(json!({"session_id": "  ", "text": "x"}));
        assert!(msg.session_id.is_none());
        let msg = msg.or_session_id(Some("from-header".to_string()));
        assert_eq!(msg.session_id.as_deref(), Some("from-header"));
    }

    #[test]
    fn test_text_is_capped() {
        let long = "a".repeat(MAX_INBOUND_CHARS + 50);
        let msg = InboundMessage::new(None, long);
        assert_eq!(msg.text.chars().count(), MAX_INBOUND_CHARS);
    }
}
