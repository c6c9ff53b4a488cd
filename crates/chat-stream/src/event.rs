use tracing::{debug, warn};

use crate::errors::DecodeError;

/// Marker that prefixes payload lines inside a frame.
pub const DATA_MARKER: &str = "data:";
/// Literal payload marking the end of the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Semantic event decoded from one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    /// Chunk of assistant text to append.
    ContentDelta { text: String },
    /// Explicit end of stream.
    Done,
    /// Terminal failure reported by the server mid-stream.
    ServerError { message: String },
}

impl ChatEvent {
    /// Whether this event ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::ServerError { .. })
    }
}

/// Returns the payload of the last `data:` line in a frame.
pub fn frame_payload(frame: &str) -> Option<&str> {
    frame
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter_map(|line| line.strip_prefix(DATA_MARKER))
        .last()
        .map(str::trim)
}

/// Parses one frame into zero or more events.
///
/// Undecodable payloads are logged and yield no events.
pub fn parse_frame(frame: &str) -> Vec<ChatEvent> {
    let Some(payload) = frame_payload(frame) else {
        debug!("frame without data line ignored");
        return Vec::new();
    };
    match decode_payload(payload) {
        Ok(events) => events,
        Err(err) => {
            warn!(error = %err, payload, "skipping undecodable event payload");
            Vec::new()
        }
    }
}

pub(crate) fn decode_payload(payload: &str) -> Result<Vec<ChatEvent>, DecodeError> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }
    if payload == DONE_SENTINEL {
        return Ok(vec![ChatEvent::Done]);
    }
    let value: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
    let Some(fields) = value.as_object() else {
        return Err(DecodeError::NotAnObject);
    };

    if let Some(message) = fields.get("error").and_then(error_message) {
        return Ok(vec![ChatEvent::ServerError { message }]);
    }
    let mut events = Vec::with_capacity(2);
    match fields.get("content") {
        Some(serde_json::Value::String(text)) if !text.is_empty() => {
            events.push(ChatEvent::ContentDelta { text: text.clone() });
        }
        Some(serde_json::Value::String(_) | serde_json::Value::Null) | None => {}
        Some(other) => debug!(content = %other, "non-text content skipped"),
    }
    if fields.get("type").and_then(serde_json::Value::as_str) == Some("done") {
        events.push(ChatEvent::Done);
    }
    if events.is_empty() {
        debug!(payload, "payload without recognized fields ignored");
    }
    Ok(events)
}

/// Message of a reported error, or `None` when the field is falsy.
fn error_message(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null | serde_json::Value::Bool(false) => None,
        serde_json::Value::String(message) => Some(message.clone()).filter(|m| !m.is_empty()),
        serde_json::Value::Number(n) if n.as_f64() == Some(0.0) => None,
        serde_json::Value::Object(map) => match map.get("message") {
            Some(serde_json::Value::String(message)) if !message.is_empty() => {
                Some(message.clone())
            }
            _ => Some(value.to_string()),
        },
        other => Some(other.to_string()),
    }
}
