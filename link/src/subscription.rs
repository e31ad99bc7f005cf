//! Subscription lifecycle and the caller-held unsubscribe handle.
//!
//! Every subscription owns one supervisor task. The [`UnsubscribeHandle`]
//! shares a small lifecycle record with that task. The cancellation flag is
//! checked before every callback; the shutdown signal is raced at every
//! suspension point.

use crate::{
    error::{ListenError, Result},
    event_handlers::SubscriptionHandlers,
    models::{subscription_request::validate_base_url, ConnectionOptions, ConnectionStatus, SubscriptionRequest},
    reconnect::ReconnectPolicy,
    supervisor::Supervisor,
    transport::ListenTransport,
};
use serde::de::DeserializeOwned;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::watch;

/// State shared between a subscription's supervisor task and its handles.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    cancelled: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl Lifecycle {
    fn new() -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        let (status_tx, _) = watch::channel(ConnectionStatus::Connecting);
        Arc::new(Self {
            cancelled: AtomicBool::new(false),
            shutdown_tx,
            status_tx,
        })
    }

    /// Whether `unsubscribe` has been called.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Mark as cancelled. Returns `false` if it already was.
    fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.shutdown_tx.send_replace(true);
        true
    }

    pub(crate) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub(crate) fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    /// Record a status transition.
    ///
    /// Returns `true` when the status actually changed. Nothing leaves
    /// `Closed`.
    pub(crate) fn transition(&self, status: ConnectionStatus) -> bool {
        self.status_tx.send_if_modified(|current| {
            if current.is_terminal() || *current == status {
                return false;
            }
            *current = status;
            true
        })
    }

    fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }
}

/// Handle returned by a subscribe call.
///
/// Cloning is cheap; every clone controls the same subscription.
/// [`unsubscribe`](Self::unsubscribe) may be called any number of times from
/// any state. Dropping the handle does **not** unsubscribe: release the
/// subscription explicitly.
#[derive(Debug, Clone)]
pub struct UnsubscribeHandle {
    lifecycle: Arc<Lifecycle>,
}

impl UnsubscribeHandle {
    /// Close the connection and stop reconnecting.
    ///
    /// Cancels an in-flight registration, closes an open stream and cancels
    /// a pending backoff timer. No callback other than the final
    /// [`ConnectionStatus::Closed`] transition fires afterwards.
    pub fn unsubscribe(&self) {
        if self.lifecycle.cancel() {
            log::debug!("[listen-link] Unsubscribe requested");
        }
    }

    /// Whether [`unsubscribe`](Self::unsubscribe) has been called.
    pub fn is_unsubscribed(&self) -> bool {
        self.lifecycle.is_cancelled()
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.lifecycle.status()
    }

    /// Receiver that observes every status change.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.lifecycle.watch_status()
    }

    /// Wait until the subscription is closed (fatal error or unsubscribe).
    pub async fn closed(&self) {
        let mut status_rx = self.lifecycle.watch_status();
        let _ = status_rx.wait_for(|status| status.is_terminal()).await;
    }
}

/// Unsubscribes the wrapped handle on drop while armed.
struct UnsubscribeOnDrop {
    handle: UnsubscribeHandle,
    armed: bool,
}

impl Drop for UnsubscribeOnDrop {
    fn drop(&mut self) {
        if self.armed {
            log::debug!("[listen-link] Subscribe abandoned before connecting");
            self.handle.unsubscribe();
        }
    }
}

/// Validate a request and start its supervisor task.
///
/// Returns immediately; the handle's status starts as
/// [`ConnectionStatus::Connecting`].
pub(crate) fn spawn_subscription<T, Tr>(
    transport: Arc<Tr>,
    mut request: SubscriptionRequest,
    options: &ConnectionOptions,
    handlers: SubscriptionHandlers<T>,
) -> Result<UnsubscribeHandle>
where
    T: DeserializeOwned + Send + 'static,
    Tr: ListenTransport,
{
    request.validate()?;

    let base_url = request
        .base_url
        .clone()
        .unwrap_or_else(|| options.base_url.clone());
    validate_base_url(&base_url)?;
    request.base_url = Some(base_url.clone());

    let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
        ListenError::ConfigurationError(
            "subscriptions must be started from within a tokio runtime".to_string(),
        )
    })?;

    let policy = ReconnectPolicy::for_request(&request, options);
    let lifecycle = Lifecycle::new();
    let shutdown_rx = lifecycle.shutdown_signal();

    log::debug!(
        "[listen-link] Starting subscription base_url={} reconnect_base={:?}",
        base_url,
        policy.base()
    );

    let supervisor = Supervisor::new(transport, request, base_url, policy, handlers, lifecycle.clone());
    runtime.spawn(supervisor.run(shutdown_rx));

    Ok(UnsubscribeHandle { lifecycle })
}

/// Start a subscription and wait until it first connects.
///
/// Also returns if the subscription is closed before it ever connected
/// (a fatal channel error on the first stream). While the service is
/// unreachable this keeps waiting, since the supervisor keeps retrying.
/// Dropping the returned future before it completes unsubscribes.
pub(crate) async fn subscribe_and_wait<T, Tr>(
    transport: Arc<Tr>,
    request: SubscriptionRequest,
    options: &ConnectionOptions,
    handlers: SubscriptionHandlers<T>,
) -> Result<UnsubscribeHandle>
where
    T: DeserializeOwned + Send + 'static,
    Tr: ListenTransport,
{
    let handle = spawn_subscription(transport, request, options, handlers)?;
    let mut guard = UnsubscribeOnDrop {
        handle: handle.clone(),
        armed: true,
    };

    let mut status_rx = handle.watch_status();
    let _ = status_rx
        .wait_for(|status| *status != ConnectionStatus::Connecting)
        .await;

    guard.armed = false;
    Ok(handle)
}
