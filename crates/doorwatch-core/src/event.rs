//! Door event payload decoding.
//!
//! The wire payload is a JSON object with optional string fields `event`,
//! `message`, and `timestamp`; everything else is captured but ignored.
//! Decoding is a pure transform: absent fields stay absent here, and all
//! defaulting happens later in [`crate::dispatch`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── DoorEvent ────────────────────────────────────────────────────────

/// A decoded door-controller event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoorEvent {
    /// Event type, e.g. `"door_button_pressed"`.
    #[serde(rename = "event", default)]
    pub event_type: Option<String>,

    /// Explicit human-readable message. When present it overrides every
    /// type-derived default downstream.
    #[serde(default)]
    pub message: Option<String>,

    /// ISO-8601 timestamp from the controller, kept as the raw string;
    /// parsing (and fallback to client time) is the dispatcher's concern.
    #[serde(default)]
    pub timestamp: Option<String>,

    /// All remaining fields, so nothing the controller sends is lost.
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl DoorEvent {
    /// Field-wise extraction for objects whose known fields carry
    /// unexpected JSON types (e.g. a numeric `event`).
    fn from_raw(value: &serde_json::Value) -> Self {
        Self {
            event_type: value["event"].as_str().map(String::from),
            message: value["message"].as_str().map(String::from),
            timestamp: value["timestamp"].as_str().map(String::from),
            extra: value.clone(),
        }
    }
}

// ── DecodeError ──────────────────────────────────────────────────────

/// Payload faults. These are logged and the message dropped; they never
/// reach the orchestrator as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8 JSON")]
    NotUtf8OrNotJson,

    #[error("payload parsed as JSON but is not an object")]
    NotAnObject,
}

// ── decode ───────────────────────────────────────────────────────────

/// Parse raw payload bytes into a [`DoorEvent`].
pub fn decode(payload: &[u8]) -> Result<DoorEvent, DecodeError> {
    let value: serde_json::Value =
        serde_json::from_slice(payload).map_err(|_| DecodeError::NotUtf8OrNotJson)?;

    if !value.is_object() {
        return Err(DecodeError::NotAnObject);
    }

    Ok(serde_json::from_value(value.clone()).unwrap_or_else(|_| DoorEvent::from_raw(&value)))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decode_full_event() {
        let event = decode(
            br#"{"event":"door_button_pressed","message":"hi","timestamp":"2026-08-29T10:00:00Z","device":"gate-1"}"#,
        )
        .unwrap();

        assert_eq!(event.event_type.as_deref(), Some("door_button_pressed"));
        assert_eq!(event.message.as_deref(), Some("hi"));
        assert_eq!(event.timestamp.as_deref(), Some("2026-08-29T10:00:00Z"));
        assert_eq!(event.extra["device"], "gate-1");
    }

    #[test]
    fn decode_empty_object_leaves_fields_absent() {
        let event = decode(b"{}").unwrap();
        assert_eq!(event.event_type, None);
        assert_eq!(event.message, None);
        assert_eq!(event.timestamp, None);
    }

    #[test]
    fn non_utf8_is_rejected() {
        assert_eq!(decode(&[0xFF, 0xFE, 0x00]), Err(DecodeError::NotUtf8OrNotJson));
    }

    #[test]
    fn non_json_is_rejected() {
        assert_eq!(decode(b"hello world"), Err(DecodeError::NotUtf8OrNotJson));
    }

    #[test]
    fn arrays_and_scalars_are_rejected() {
        assert_eq!(decode(b"[1,2,3]"), Err(DecodeError::NotAnObject));
        assert_eq!(decode(b"42"), Err(DecodeError::NotAnObject));
        assert_eq!(decode(b"\"door\""), Err(DecodeError::NotAnObject));
        assert_eq!(decode(b"null"), Err(DecodeError::NotAnObject));
    }

    #[test]
    fn mistyped_fields_degrade_to_absent() {
        // A numeric `event` is not a valid string field; field-wise
        // extraction keeps the rest of the event usable.
        let event = decode(br#"{"event":7,"message":"still here"}"#).unwrap();
        assert_eq!(event.event_type, None);
        assert_eq!(event.message.as_deref(), Some("still here"));
    }
}
