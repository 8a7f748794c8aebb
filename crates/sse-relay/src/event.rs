//! Event types and wire serialization

use serde::{Deserialize, Serialize};

/// Default event type when none was named on the wire
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// A single event, parsed from or destined for the wire.
///
/// `data` may span multiple logical lines; each line becomes one `data:`
/// field on the wire and parsed multi-line payloads are joined with `\n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseEvent {
    /// Event type (e.g., "message", "update", "oneShotCommand")
    #[serde(rename = "event")]
    pub event_type: String,

    /// Newline-joined payload lines
    pub data: String,

    /// Opaque last-seen event id, carried connection-wide; last value wins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_event_id: Option<String>,
}

impl SseEvent {
    /// Create a new event with the given type and payload
    pub fn new(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
            last_event_id: None,
        }
    }

    /// Create a plain "message" event
    pub fn message(data: impl Into<String>) -> Self {
        Self::new(DEFAULT_EVENT_TYPE, data)
    }

    /// Set the event id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.last_event_id = Some(id.into());
        self
    }

    /// Serialize to the wire format.
    ///
    /// Field order is fixed: `event:`, then `lastEventId:` when an id is
    /// present and non-empty, then one `data:` line per payload line, then
    /// the terminating blank line.
    pub fn to_wire(&self) -> String {
        let mut buf = String::with_capacity(self.data.len() + 32);
        buf.push_str("event: ");
        buf.push_str(&self.event_type);
        buf.push('\n');
        if let Some(id) = self.last_event_id.as_deref().filter(|id| !id.is_empty()) {
            buf.push_str("lastEventId: ");
            buf.push_str(id);
            buf.push('\n');
        }
        for line in self.data.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            buf.push_str("data: ");
            buf.push_str(line);
            buf.push('\n');
        }
        buf.push('\n');
        buf
    }
}
