//! Incremental event parser
//!
//! One `EventParser` per connection. Feed it raw chunks as they arrive; it
//! buffers a trailing partial line across chunk boundaries and returns
//! complete events in the order their terminating blank line was seen.

use bytes::BytesMut;
use tracing::trace;

use crate::event::{SseEvent, DEFAULT_EVENT_TYPE};

const INITIAL_BUFFER_SIZE: usize = 1024;

/// Stateful parser turning a byte stream into discrete events.
///
/// Lines are delimited by `\n` or `\r\n`; mixed usage within one stream is
/// accepted line-by-line. A lone `\r` does not terminate a line.
pub struct EventParser {
    /// Bytes not yet forming a complete line
    buffer: BytesMut,
    /// Data lines accumulated for the current event, `\n`-terminated each
    data: String,
    /// Type named by the most recent `event:` line, if any
    event_type: String,
    /// Last id seen on this connection; survives across events
    last_event_id: Option<String>,
}

impl EventParser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            data: String::new(),
            event_type: String::new(),
            last_event_id: None,
        }
    }

    /// Consume one chunk of the stream, returning every event completed by it.
    ///
    /// Safe to call with chunks split at arbitrary byte offsets, including
    /// mid-line and mid-UTF-8-sequence; only complete lines are interpreted.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line = self.buffer.split_to(pos + 1);
            let mut line = &line[..pos];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            let line = String::from_utf8_lossy(line).into_owned();
            self.process_line(&line, &mut events);
        }
        events
    }

    /// Flush on stream close.
    ///
    /// Any unterminated remainder is treated as a final line, and close acts
    /// as an implicit blank line for peers that hang up without one. Nothing
    /// dispatches unless some event data had accumulated.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let line = self.buffer.split();
            let mut line = &line[..];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            let line = String::from_utf8_lossy(line).into_owned();
            if !line.is_empty() {
                let mut events = Vec::new();
                self.process_line(&line, &mut events);
            }
        }
        if self.data.is_empty() {
            return None;
        }
        Some(self.dispatch())
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        if line.is_empty() {
            events.push(self.dispatch());
        } else if line.starts_with(':') {
            // comment line
        } else if let Some(pos) = line.find(':') {
            let field = &line[..pos];
            let value = &line[pos + 1..];
            let value = value.strip_prefix(' ').unwrap_or(value);
            self.process_field(field, value);
        } else {
            trace!(line, "ignoring field line without a value");
        }
    }

    fn process_field(&mut self, field: &str, value: &str) {
        match field {
            "event" => {
                // a new event: line starts a fresh event
                self.event_type = value.to_string();
                self.data.clear();
            }
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" => self.last_event_id = Some(value.to_string()),
            "retry" => {}
            _ => trace!(field, "ignoring unrecognized field"),
        }
    }

    fn dispatch(&mut self) -> SseEvent {
        if self.data.ends_with('\n') {
            self.data.pop();
        }
        let event_type = std::mem::take(&mut self.event_type);
        SseEvent {
            event_type: if event_type.is_empty() {
                DEFAULT_EVENT_TYPE.to_string()
            } else {
                event_type
            },
            data: std::mem::take(&mut self.data),
            last_event_id: self.last_event_id.clone(),
        }
    }
}

impl Default for EventParser {
    fn default() -> Self {
        Self::new()
    }
}
