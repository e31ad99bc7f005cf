//! Reconnection supervisor.
//!
//! One task per subscription. Each attempt registers the query and opens
//! the event stream, then turns queued [`StreamEvent`]s into callbacks.
//! Any failure short of a fatal channel error schedules another attempt
//! after a linearly growing delay. Every await point is raced against the
//! unsubscribe signal.

use crate::{
    error::ListenError,
    event_handlers::SubscriptionHandlers,
    event_stream::StreamEvent,
    models::{ChannelErrorData, ConnectionStatus, SubscriptionRequest},
    reconnect::ReconnectPolicy,
    subscription::Lifecycle,
    transport::ListenTransport,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::watch;

/// How one connection attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptOutcome {
    /// Registration, connect or the stream failed; try again.
    Retry {
        /// Whether the stream reached `open` before failing.
        reached_open: bool,
    },
    /// A fatal channel error or a non-retryable failure closed the subscription.
    Closed,
    /// Unsubscribe was observed between two events.
    Cancelled,
}

/// Attempt number of the next retry.
///
/// Counts consecutive failures; a stream that reached `open` resets the count.
fn next_attempt(previous: u32, outcome_reached_open: bool) -> u32 {
    if outcome_reached_open {
        1
    } else {
        previous.saturating_add(1)
    }
}

/// Resolves once unsubscribe has been requested.
async fn shutdown_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    // The sender lives in the shared lifecycle; an error means it is gone,
    // which only happens once nobody can observe the subscription anymore.
    let _ = shutdown_rx.wait_for(|requested| *requested).await;
}

pub(crate) struct Supervisor<T, Tr> {
    transport: Arc<Tr>,
    request: SubscriptionRequest,
    base_url: String,
    policy: ReconnectPolicy,
    handlers: SubscriptionHandlers<T>,
    lifecycle: Arc<Lifecycle>,
}

impl<T, Tr> Supervisor<T, Tr>
where
    T: DeserializeOwned + Send + 'static,
    Tr: ListenTransport,
{
    pub(crate) fn new(
        transport: Arc<Tr>,
        request: SubscriptionRequest,
        base_url: String,
        policy: ReconnectPolicy,
        handlers: SubscriptionHandlers<T>,
        lifecycle: Arc<Lifecycle>,
    ) -> Self {
        Self {
            transport,
            request,
            base_url,
            policy,
            handlers,
            lifecycle,
        }
    }

    /// Drive the subscription until it is closed or unsubscribed.
    pub(crate) async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        if !self.lifecycle.is_cancelled() {
            self.handlers.emit_status_change(ConnectionStatus::Connecting);
        }

        let mut attempt: u32 = 0;
        loop {
            let outcome = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown_rx) => AttemptOutcome::Cancelled,
                outcome = self.run_attempt(attempt) => outcome,
            };

            let reached_open = match outcome {
                AttemptOutcome::Retry { reached_open } => reached_open,
                AttemptOutcome::Closed => return,
                AttemptOutcome::Cancelled => break,
            };

            self.set_status(ConnectionStatus::Connecting);
            attempt = next_attempt(attempt, reached_open);
            let delay = self.policy.delay_for(attempt);
            log::info!(
                "[listen-link] Attempting reconnection in {}ms (attempt {})",
                delay.as_millis(),
                attempt
            );

            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown_rx) => break,
                _ = tokio::time::sleep(delay) => {},
            }
        }

        log::debug!("[listen-link] Subscription unsubscribed");
        self.set_status(ConnectionStatus::Closed);
    }

    /// One registration + stream lifetime.
    async fn run_attempt(&self, attempt: u32) -> AttemptOutcome {
        let registration = match self.transport.register(&self.request).await {
            Ok(registration) => registration,
            Err(e) => return self.failed(attempt, e),
        };
        if self.lifecycle.is_cancelled() {
            return AttemptOutcome::Cancelled;
        }

        let mut stream = match self.transport.connect(&self.base_url, &registration).await {
            Ok(stream) => stream,
            Err(e) => return self.failed(attempt, e),
        };

        let mut reached_open = false;
        loop {
            let Some(event) = stream.next_event().await else {
                log::warn!("[listen-link] Event stream closed by transport");
                stream.close();
                return AttemptOutcome::Retry { reached_open };
            };

            if self.lifecycle.is_cancelled() {
                stream.close();
                return AttemptOutcome::Cancelled;
            }

            match event {
                StreamEvent::Open => {
                    log::info!("[listen-link] Event stream open for registration {}", registration.id);
                    reached_open = true;
                    self.set_status(ConnectionStatus::Connected);
                },
                StreamEvent::Update(update) => match update.decode::<T>() {
                    Ok(update) => self.handlers.emit_update(update),
                    Err(e) => {
                        log::warn!("[listen-link] Update does not match the result type: {}", e);
                        self.handlers
                            .emit_channel_error(ChannelErrorData::invalid_payload("update", e));
                    },
                },
                StreamEvent::ChannelError(error) if error.fatal => {
                    log::warn!("[listen-link] Fatal channel error: {}", error);
                    stream.close();
                    self.set_status(ConnectionStatus::Closed);
                    self.handlers.emit_channel_error(error);
                    return AttemptOutcome::Closed;
                },
                StreamEvent::ChannelError(error) => {
                    log::warn!("[listen-link] Channel error: {}", error);
                    self.handlers.emit_channel_error(error);
                },
                StreamEvent::Malformed { event, reason } => {
                    log::warn!("[listen-link] Malformed '{}' event: {}", event, reason);
                    self.handlers
                        .emit_channel_error(ChannelErrorData::invalid_payload(&event, reason));
                },
                StreamEvent::Dropped { reason } => {
                    log::warn!("[listen-link] Event stream dropped: {}", reason);
                    stream.close();
                    return AttemptOutcome::Retry { reached_open };
                },
            }
        }
    }

    fn failed(&self, attempt: u32, error: ListenError) -> AttemptOutcome {
        if error.is_retryable() {
            log::warn!("[listen-link] Connection attempt {} failed: {}", attempt + 1, error);
            return AttemptOutcome::Retry {
                reached_open: false,
            };
        }

        log::error!("[listen-link] Giving up on subscription: {}", error);
        self.set_status(ConnectionStatus::Closed);
        AttemptOutcome::Closed
    }

    /// Record a transition and notify the caller if it changed anything.
    ///
    /// After unsubscribe only the final `Closed` goes through.
    fn set_status(&self, status: ConnectionStatus) {
        if self.lifecycle.is_cancelled() && status != ConnectionStatus::Closed {
            return;
        }
        if self.lifecycle.transition(status) {
            log::debug!("[listen-link] Status -> {}", status);
            self.handlers.emit_status_change(status);
        }
    }
}
