//! Incremental parser for the `text/event-stream` wire format.
//!
//! Bytes are fed as they arrive off the connection; complete events are
//! returned once their terminating blank line has been seen. Only the
//! `event` and `data` fields are kept. `id` and `retry` are accepted and
//! ignored, and comment lines (leading `:`) are skipped.

use crate::error::{ListenError, Result};
use bytes::BytesMut;

/// Maximum size of a single buffered line or event payload (16 MiB).
pub(crate) const MAX_SSE_EVENT_BYTES: usize = 16 << 20;

/// Event name used when a frame carries no `event:` field.
pub const DEFAULT_EVENT_NAME: &str = "message";

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name (`message` when the frame had no `event:` field)
    pub event: String,
    /// Data lines joined with `\n`
    pub data: String,
}

/// Stateful line parser; keeps partial lines and fields between chunks.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: BytesMut,
    event: Option<String>,
    data: String,
    has_data: bool,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every event it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw = self.buffer.split_to(newline_pos + 1).freeze();
            let mut line = &raw[..newline_pos];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            let line = String::from_utf8_lossy(line);
            if let Some(event) = self.process_line(&line)? {
                events.push(event);
            }
        }

        if self.buffer.len() > MAX_SSE_EVENT_BYTES {
            return Err(ListenError::StreamError(format!(
                "Event stream line exceeds {} bytes",
                MAX_SSE_EVENT_BYTES
            )));
        }

        Ok(events)
    }

    fn process_line(&mut self, line: &str) -> Result<Option<SseEvent>> {
        if line.is_empty() {
            return Ok(self.dispatch());
        }

        if line.starts_with(':') {
            return Ok(None);
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                if self.data.len() + value.len() > MAX_SSE_EVENT_BYTES {
                    return Err(ListenError::StreamError(format!(
                        "Event payload exceeds {} bytes",
                        MAX_SSE_EVENT_BYTES
                    )));
                }
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            },
            "id" | "retry" => {},
            other => log::trace!("[listen-link] Ignoring unknown SSE field '{}'", other),
        }

        Ok(None)
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if !self.has_data {
            return None;
        }
        self.has_data = false;
        Some(SseEvent {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT_NAME.to_string()),
            data: std::mem::take(&mut self.data),
        })
    }
}
