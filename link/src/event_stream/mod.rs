//! Server-push event stream for a registration.
//!
//! This module contains:
//! - [`sse`]: incremental `text/event-stream` parser
//! - [`EventStreamConnector`]: opens `{base_url}/events/{id}` and spawns a
//!   reader task that classifies named events into [`StreamEvent`]s
//! - [`StreamHandle`]: consumer side of the reader's queue, closable any
//!   number of times

pub mod sse;

use crate::{
    error::{ListenError, Result},
    models::{ChannelErrorData, Registration, UpdateData},
    timeouts::ListenTimeouts,
};
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use sse::{SseEvent, SseParser};
use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Event name carrying a new query result.
pub const UPDATE_EVENT: &str = "update";

/// Event name carrying a [`ChannelErrorData`].
pub const CHANNEL_ERROR_EVENT: &str = "channelError";

/// Typed event produced by the stream reader.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The stream has been accepted by the server.
    Open,
    /// `update` event with a well-formed payload.
    Update(UpdateData),
    /// `channelError` event with a well-formed payload.
    ChannelError(ChannelErrorData),
    /// A known event whose payload failed validation.
    Malformed {
        /// Event name
        event: String,
        /// Why validation failed
        reason: String,
    },
    /// The transport went away without an explicit channel error.
    Dropped {
        /// Human-readable description
        reason: String,
    },
}

impl StreamEvent {
    /// Classify a raw server-sent event.
    ///
    /// Returns `None` for event names this client does not handle.
    pub fn classify(raw: &SseEvent) -> Option<Self> {
        match raw.event.as_str() {
            UPDATE_EVENT => Some(match serde_json::from_str::<UpdateData>(&raw.data) {
                Ok(update) => StreamEvent::Update(update),
                Err(e) => StreamEvent::Malformed {
                    event: raw.event.clone(),
                    reason: e.to_string(),
                },
            }),
            CHANNEL_ERROR_EVENT => Some(match serde_json::from_str::<ChannelErrorData>(&raw.data) {
                Ok(error) => StreamEvent::ChannelError(error),
                Err(e) => StreamEvent::Malformed {
                    event: raw.event.clone(),
                    reason: e.to_string(),
                },
            }),
            _ => None,
        }
    }
}

/// Readiness of a [`StreamHandle`], mirroring the browser `EventSource`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    /// Response not yet accepted.
    Connecting = 0,
    /// Events are flowing.
    Open = 1,
    /// Closed locally or ended by the server.
    Closed = 2,
}

impl ReadyState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            _ => ReadyState::Closed,
        }
    }
}

/// Consumer side of one event stream connection.
///
/// Dropping the handle closes the connection.
pub struct StreamHandle {
    events: mpsc::Receiver<StreamEvent>,
    ready_state: Arc<AtomicU8>,
    reader: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("ready_state", &self.ready_state())
            .field("has_reader", &self.reader.is_some())
            .finish()
    }
}

impl StreamHandle {
    /// Wrap a queue fed by a custom transport.
    ///
    /// The producer is expected to send [`StreamEvent::Open`] first. Dropping
    /// the sender is treated as a transport drop.
    pub fn from_receiver(events: mpsc::Receiver<StreamEvent>) -> Self {
        Self {
            events,
            ready_state: Arc::new(AtomicU8::new(ReadyState::Open as u8)),
            reader: None,
        }
    }

    /// Receive the next event; `None` once the stream is closed and drained.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Current readiness.
    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.ready_state.load(Ordering::SeqCst))
    }

    /// Whether the handle has been closed.
    pub fn is_closed(&self) -> bool {
        self.ready_state() == ReadyState::Closed
    }

    /// Close the connection. Calling this on a closed handle does nothing.
    pub fn close(&mut self) {
        let previous = self.ready_state.swap(ReadyState::Closed as u8, Ordering::SeqCst);
        if ReadyState::from_u8(previous) == ReadyState::Closed && self.reader.is_none() {
            return;
        }
        if let Some(reader) = self.reader.take() {
            // Aborting the reader drops the response body, which closes the socket.
            reader.abort();
        }
        self.events.close();
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Build `{base_url}/events/{registration_id}` with the id percent-encoded.
pub fn event_stream_url(base_url: &str, registration_id: &str) -> Result<Url> {
    let mut url = Url::parse(base_url.trim()).map_err(|e| {
        ListenError::ConfigurationError(format!("Invalid base_url '{}': {}", base_url, e))
    })?;

    url.path_segments_mut()
        .map_err(|_| {
            ListenError::ConfigurationError(format!("base_url '{}' cannot be a base", base_url))
        })?
        .pop_if_empty()
        .push("events")
        .push(registration_id);

    Ok(url)
}

fn is_event_stream_content_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .map(|media_type| media_type.trim().eq_ignore_ascii_case("text/event-stream"))
        .unwrap_or(false)
}

/// Opens event streams over HTTP.
#[derive(Clone, Debug)]
pub struct EventStreamConnector {
    http_client: reqwest::Client,
    timeouts: ListenTimeouts,
    channel_capacity: usize,
}

impl EventStreamConnector {
    pub(crate) fn new(
        http_client: reqwest::Client,
        timeouts: ListenTimeouts,
        channel_capacity: usize,
    ) -> Self {
        Self {
            http_client,
            timeouts,
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Open the event stream for a registration.
    ///
    /// Resolves once the response headers have been accepted; events then
    /// arrive through the returned handle, starting with
    /// [`StreamEvent::Open`].
    pub async fn connect(&self, base_url: &str, registration: &Registration) -> Result<StreamHandle> {
        let url = event_stream_url(base_url, &registration.id)?;
        log::debug!("[listen-link] Opening event stream {}", url);

        let send = self
            .http_client
            .get(url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send();

        // The per-request reqwest timeout would also cut the body, so only
        // the wait for response headers is bounded here.
        let sent = if ListenTimeouts::is_no_timeout(self.timeouts.stream_open_timeout) {
            send.await
        } else {
            tokio::time::timeout(self.timeouts.stream_open_timeout, send)
                .await
                .map_err(|_| {
                    ListenError::StreamError(format!(
                        "Timed out after {:?} opening {}",
                        self.timeouts.stream_open_timeout, url
                    ))
                })?
        };
        let response =
            sent.map_err(|e| ListenError::StreamError(format!("Failed to open {}: {}", url, e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ListenError::StreamError(format!(
                "Event stream rejected with status {}",
                status.as_u16()
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if !is_event_stream_content_type(content_type) {
            return Err(ListenError::StreamError(format!(
                "Unexpected event stream content type '{}'",
                content_type
            )));
        }

        let (event_tx, event_rx) = mpsc::channel(self.channel_capacity);
        let ready_state = Arc::new(AtomicU8::new(ReadyState::Connecting as u8));
        let reader = tokio::spawn(read_event_stream(
            response,
            event_tx,
            ready_state.clone(),
            self.timeouts.receive_timeout,
        ));

        Ok(StreamHandle {
            events: event_rx,
            ready_state,
            reader: Some(reader),
        })
    }
}

/// Background reader: pulls bytes, parses frames and queues typed events.
///
/// Always ends with [`StreamEvent::Dropped`] unless the consumer went away.
async fn read_event_stream(
    response: reqwest::Response,
    event_tx: mpsc::Sender<StreamEvent>,
    ready_state: Arc<AtomicU8>,
    receive_timeout: Duration,
) {
    ready_state.store(ReadyState::Open as u8, Ordering::SeqCst);
    if event_tx.send(StreamEvent::Open).await.is_err() {
        return;
    }

    let mut body = response.bytes_stream();
    let mut parser = SseParser::new();
    let has_receive_timeout = !ListenTimeouts::is_no_timeout(receive_timeout);

    let reason = loop {
        let next = if has_receive_timeout {
            match tokio::time::timeout(receive_timeout, body.next()).await {
                Ok(next) => next,
                Err(_) => break format!("No data received for {:?}", receive_timeout),
            }
        } else {
            body.next().await
        };

        match next {
            Some(Ok(chunk)) => {
                let frames = match parser.feed(&chunk) {
                    Ok(frames) => frames,
                    Err(e) => break e.to_string(),
                };
                for raw in frames {
                    log::trace!("[listen-link] SSE event '{}': {}", raw.event, raw.data);
                    let Some(event) = StreamEvent::classify(&raw) else {
                        log::debug!("[listen-link] Ignoring unhandled event '{}'", raw.event);
                        continue;
                    };
                    if event_tx.send(event).await.is_err() {
                        log::debug!("[listen-link] Event receiver dropped, stopping reader");
                        return;
                    }
                }
            },
            Some(Err(e)) => break format!("Event stream read failed: {}", e),
            None => break "Event stream ended".to_string(),
        }
    };

    ready_state.store(ReadyState::Closed as u8, Ordering::SeqCst);
    let _ = event_tx.send(StreamEvent::Dropped { reason }).await;
}
