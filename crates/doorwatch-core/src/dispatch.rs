//! Event-to-alert dispatch: defaulting and timestamp resolution.
//!
//! Pure apart from the caller-supplied clock. The two-stage defaulting is
//! load-bearing: the body starts from a type-keyed default and an explicit
//! `message` always wins, regardless of `event_type`.

use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime};

use crate::event::DoorEvent;

/// Title prefix for every alert.
const TITLE_PREFIX: &str = "Door alert";

/// Clock-face format used in alert titles.
const TIME_FORMAT: &str = "%H:%M:%S";

// ── AlertRequest ─────────────────────────────────────────────────────

/// What the presentation layer is asked to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRequest {
    pub title: String,
    pub body: String,
    pub duration: Duration,
}

// ── NotificationDefaults ─────────────────────────────────────────────

/// Configuration-sourced defaults applied at dispatch time.
#[derive(Debug, Clone)]
pub struct NotificationDefaults {
    /// How long the alert stays on screen before auto-hide.
    pub duration: Duration,
}

impl Default for NotificationDefaults {
    fn default() -> Self {
        Self {
            duration: Duration::from_millis(3000),
        }
    }
}

// ── to_alert ─────────────────────────────────────────────────────────

/// Convert a decoded event into a presentation request.
///
/// The display time prefers the event's own timestamp; a missing or
/// unparsable stamp degrades to `now` and never fails the event.
pub fn to_alert(
    event: &DoorEvent,
    defaults: &NotificationDefaults,
    now: DateTime<Local>,
) -> AlertRequest {
    let time = event
        .timestamp
        .as_deref()
        .and_then(format_timestamp)
        .unwrap_or_else(|| now.format(TIME_FORMAT).to_string());

    let mut body = match event.event_type.as_deref() {
        // Hardware sends no type on the plain button press, so absent
        // means the same as the well-known pressed event.
        Some("door_button_pressed") | None => "door button pressed".to_owned(),
        Some("door_button_released") => "door button released".to_owned(),
        Some(other) => format!("event: {other}"),
    };

    if let Some(ref message) = event.message {
        body = message.clone();
    }

    AlertRequest {
        title: format!("{TITLE_PREFIX} - {time}"),
        body,
        duration: defaults.duration,
    }
}

/// Format an ISO-8601 stamp as `HH:mm:ss` in the stamp's own offset.
fn format_timestamp(stamp: &str) -> Option<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(stamp) {
        return Some(dt.format(TIME_FORMAT).to_string());
    }
    // Controllers without a clock source send naive local stamps.
    NaiveDateTime::parse_from_str(stamp, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|dt| dt.format(TIME_FORMAT).to_string())
}

// ── Tests ────────────────────────────────────────────────────────────
