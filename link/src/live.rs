//! Stateful live query.
//!
//! [`LiveQuery`] wraps a subscription and folds its callbacks into a single
//! observable [`LiveQueryState`]: the latest status, the latest result and the
//! latest channel error. Changing its options tears the current subscription
//! down and starts a new one; callbacks that still arrive from the old one are
//! ignored.

use crate::{
    client::ListenClient,
    error::{ListenError, Result},
    event_handlers::SubscriptionHandlers,
    models::{ChannelErrorData, ConnectionStatus, SubscriptionRequest},
    subscription::UnsubscribeHandle,
    transport::{HttpTransport, ListenTransport},
};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};
use tokio::sync::watch;

/// Options of a [`LiveQuery`].
#[derive(Debug, Clone)]
pub struct LiveQueryOptions<T = JsonValue> {
    /// When `false` no connection is made and the status is `Closed`.
    pub enabled: bool,

    /// Returned by [`LiveQuery::data`] while no result is held.
    pub initial_data: Option<T>,

    /// Subscription to run. Required when `enabled` is `true`.
    pub request: Option<SubscriptionRequest>,
}

impl<T> LiveQueryOptions<T> {
    /// Enabled options for a request.
    pub fn new(request: SubscriptionRequest) -> Self {
        Self {
            enabled: true,
            initial_data: None,
            request: Some(request),
        }
    }

    /// Options that never connect.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            initial_data: None,
            request: None,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_initial_data(mut self, data: T) -> Self {
        self.initial_data = Some(data);
        self
    }

    fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        match &self.request {
            Some(request) => request.validate(),
            None => Err(ListenError::ConfigurationError(
                "an enabled live query needs a request".to_string(),
            )),
        }
    }

    /// Whether both options describe the same subscription.
    ///
    /// `initial_data` does not take part: it only affects what is reported
    /// while no result is held.
    fn same_subscription(&self, other: &Self) -> bool {
        self.enabled == other.enabled && self.request == other.request
    }
}

/// Observable state of a [`LiveQuery`].
#[derive(Debug, Clone, PartialEq)]
pub struct LiveQueryState<T = JsonValue> {
    pub status: ConnectionStatus,
    /// Latest result; cleared by a channel error.
    pub data: Option<T>,
    /// Latest channel error; cleared by the next result.
    pub error: Option<ChannelErrorData>,
}

impl<T> LiveQueryState<T> {
    fn with_status(status: ConnectionStatus) -> Self {
        Self {
            status,
            data: None,
            error: None,
        }
    }
}

struct Shared<T> {
    state: watch::Sender<LiveQueryState<T>>,
    generation: AtomicU64,
}

impl<T> Shared<T> {
    /// Apply `update` only if `generation` is still the active subscription.
    fn apply(&self, generation: u64, update: impl FnOnce(&mut LiveQueryState<T>)) {
        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            update(state);
            true
        });
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.state.send_if_modified(|state| {
            if state.status == status {
                return false;
            }
            state.status = status;
            true
        });
    }
}

struct Inner<T> {
    options: LiveQueryOptions<T>,
    active: Option<UnsubscribeHandle>,
}

/// A subscription exposed as current state.
///
/// Dropping the live query unsubscribes.
///
/// # Example
///
/// ```rust,no_run
/// use listen_link::{ListenClient, LiveQueryOptions, SubscriptionRequest};
///
/// # async fn example() -> listen_link::Result<()> {
/// let client = ListenClient::builder().build()?;
/// let query = client.live_query::<serde_json::Value>(
///     LiveQueryOptions::new(SubscriptionRequest::new("{ allPosts { title } }", "token"))
///         .with_initial_data(serde_json::json!({ "allPosts": [] })),
/// )?;
///
/// let mut state = query.watch();
/// while state.changed().await.is_ok() {
///     println!("{:?}", query.snapshot());
/// }
/// # Ok(())
/// # }
/// ```
pub struct LiveQuery<T, Tr = HttpTransport> {
    client: ListenClient<Tr>,
    shared: Arc<Shared<T>>,
    inner: Mutex<Inner<T>>,
}

impl<T, Tr> LiveQuery<T, Tr>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
    Tr: ListenTransport,
{
    pub(crate) fn new(client: ListenClient<Tr>, options: LiveQueryOptions<T>) -> Result<Self> {
        options.validate()?;

        let (state, _) = watch::channel(LiveQueryState::with_status(ConnectionStatus::Closed));
        let query = Self {
            client,
            shared: Arc::new(Shared {
                state,
                generation: AtomicU64::new(0),
            }),
            inner: Mutex::new(Inner {
                options,
                active: None,
            }),
        };

        {
            let mut inner = query.lock_inner();
            query.start(&mut inner)?;
        }
        Ok(query)
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.shared.state.borrow().status
    }

    /// Latest result, or `initial_data` while none is held.
    pub fn data(&self) -> Option<T> {
        let data = self.shared.state.borrow().data.clone();
        data.or_else(|| self.lock_inner().options.initial_data.clone())
    }

    /// Latest channel error.
    pub fn error(&self) -> Option<ChannelErrorData> {
        self.shared.state.borrow().error.clone()
    }

    /// Status, data (with the `initial_data` fallback) and error together.
    pub fn snapshot(&self) -> LiveQueryState<T> {
        let mut state = self.shared.state.borrow().clone();
        if state.data.is_none() {
            state.data = self.lock_inner().options.initial_data.clone();
        }
        state
    }

    /// Receiver notified on every state change.
    ///
    /// The received state carries the raw `data`, without the
    /// `initial_data` fallback.
    pub fn watch(&self) -> watch::Receiver<LiveQueryState<T>> {
        self.shared.state.subscribe()
    }

    /// Current options.
    pub fn options(&self) -> LiveQueryOptions<T> {
        self.lock_inner().options.clone()
    }

    /// Replace the options.
    ///
    /// Re-subscribes exactly once if `enabled` or the request changed
    /// (compared by value) and returns whether it did. A new `initial_data`
    /// alone never re-subscribes.
    pub fn set_options(&self, options: LiveQueryOptions<T>) -> Result<bool> {
        options.validate()?;

        let mut inner = self.lock_inner();
        let restart = !inner.options.same_subscription(&options);
        let previous = std::mem::replace(&mut inner.options, options);
        if !restart {
            return Ok(false);
        }

        log::debug!(
            "[listen-link] Live query options changed, re-subscribing (enabled={})",
            inner.options.enabled
        );
        self.teardown(&mut inner);
        if let Err(e) = self.start(&mut inner) {
            // Nothing is running now; keep the old options so the same
            // change can be retried.
            inner.options = previous;
            return Err(e);
        }
        Ok(true)
    }

    /// Stop the subscription. The status becomes `Closed`.
    ///
    /// Calling this again does nothing. A later [`set_options`](Self::set_options)
    /// with different options starts a new subscription.
    pub fn unsubscribe(&self) {
        let mut inner = self.lock_inner();
        self.teardown(&mut inner);
        self.shared.set_status(ConnectionStatus::Closed);
    }

    fn start(&self, inner: &mut Inner<T>) -> Result<()> {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let request = match (&inner.options.request, inner.options.enabled) {
            (Some(request), true) => request.clone(),
            _ => {
                self.shared.set_status(ConnectionStatus::Closed);
                return Ok(());
            },
        };

        self.shared.set_status(ConnectionStatus::Connecting);
        match self.client.spawn_subscription(request, self.handlers(generation)) {
            Ok(handle) => {
                inner.active = Some(handle);
                Ok(())
            },
            Err(e) => {
                log::warn!("[listen-link] Live query could not subscribe: {}", e);
                self.shared.set_status(ConnectionStatus::Closed);
                Err(e)
            },
        }
    }

    fn handlers(&self, generation: u64) -> SubscriptionHandlers<T> {
        let on_status = Arc::clone(&self.shared);
        let on_update = Arc::clone(&self.shared);
        let on_error = Arc::clone(&self.shared);

        SubscriptionHandlers::new()
            .on_status_change(move |status| {
                on_status.apply(generation, |state| state.status = status)
            })
            .on_update(move |update| {
                on_update.apply(generation, |state| {
                    state.error = None;
                    state.data = Some(update.into_data());
                })
            })
            .on_channel_error(move |error| {
                on_error.apply(generation, |state| {
                    state.data = None;
                    state.error = Some(error);
                })
            })
    }
}

impl<T, Tr> LiveQuery<T, Tr> {
    fn lock_inner(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Invalidate the current generation and release its subscription.
    fn teardown(&self, inner: &mut Inner<T>) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = inner.active.take() {
            handle.unsubscribe();
        }
    }
}

impl<T, Tr> Drop for LiveQuery<T, Tr> {
    fn drop(&mut self) {
        let mut inner = self.lock_inner();
        self.teardown(&mut inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event_stream::StreamEvent,
        models::{ConnectionOptions, UpdateData},
        test_support::{ScriptedTransport, Step},
    };
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn client(steps: Vec<Step>) -> ListenClient<ScriptedTransport> {
        ListenClient::with_transport(
            ScriptedTransport::new(steps),
            ConnectionOptions::new()
                .with_base_url("https://listen.test")
                .with_reconnect_delay_ms(100),
        )
        .unwrap()
    }

    fn request(query: &str) -> SubscriptionRequest {
        SubscriptionRequest::new(query, "token")
    }

    async fn wait_for(
        query: &LiveQuery<JsonValue, ScriptedTransport>,
        f: impl FnMut(&LiveQueryState<JsonValue>) -> bool,
    ) {
        let mut rx = query.watch();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(f))
            .await
            .expect("state not reached")
            .unwrap();
    }

    #[test]
    fn test_disabled_is_closed_with_initial_data() {
        let query = client(vec![])
            .live_query(LiveQueryOptions::disabled().with_initial_data(json!({ "posts": [] })))
            .unwrap();

        assert_eq!(query.status(), ConnectionStatus::Closed);
        assert_eq!(query.data(), Some(json!({ "posts": [] })));
        assert_eq!(query.error(), None);
        assert_eq!(query.client.transport().register_count(), 0);
    }

    #[test]
    fn test_enabled_without_request_is_rejected() {
        let options = LiveQueryOptions::<JsonValue>::disabled().with_enabled(true);
        let result = client(vec![]).live_query(options);
        assert!(matches!(result, Err(ListenError::ConfigurationError(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_sets_data() {
        let (tx, rx) = mpsc::channel(8);
        let query = client(vec![Step::Stream(rx)])
            .live_query(LiveQueryOptions::new(request("{ x }")))
            .unwrap();
        assert_eq!(query.status(), ConnectionStatus::Connecting);

        tx.send(StreamEvent::Open).await.unwrap();
        tx.send(StreamEvent::Update(UpdateData::new(json!({ "x": 1 })))).await.unwrap();
        wait_for(&query, |s| s.data.is_some()).await;

        assert_eq!(
            query.snapshot(),
            LiveQueryState {
                status: ConnectionStatus::Connected,
                data: Some(json!({ "x": 1 })),
                error: None,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_updates_replace() {
        let (tx, rx) = mpsc::channel(8);
        let query = client(vec![Step::Stream(rx)])
            .live_query(LiveQueryOptions::new(request("{ a }")))
            .unwrap();

        tx.send(StreamEvent::Open).await.unwrap();
        tx.send(StreamEvent::Update(UpdateData::new(json!({ "a": 1, "b": 1 })))).await.unwrap();
        tx.send(StreamEvent::Update(UpdateData::new(json!({ "a": 2 })))).await.unwrap();
        wait_for(&query, |s| s.data == Some(json!({ "a": 2 }))).await;

        assert_eq!(query.data(), Some(json!({ "a": 2 })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_channel_error_clears_data() {
        let (tx, rx) = mpsc::channel(8);
        let query = client(vec![Step::Stream(rx), Step::RegisterFails])
            .live_query(LiveQueryOptions::new(request("{ x }")))
            .unwrap();

        tx.send(StreamEvent::Open).await.unwrap();
        tx.send(StreamEvent::Update(UpdateData::new(json!({ "x": 1 })))).await.unwrap();
        tx.send(StreamEvent::ChannelError(ChannelErrorData::new("BAD_QUERY", "m", true)))
            .await
            .unwrap();
        wait_for(&query, |s| s.error.is_some()).await;

        let state = query.snapshot();
        assert_eq!(state.status, ConnectionStatus::Closed);
        assert_eq!(state.data, None);
        assert_eq!(state.error, Some(ChannelErrorData::new("BAD_QUERY", "m", true)));

        query.unsubscribe();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(query.status(), ConnectionStatus::Closed);
        assert_eq!(query.client.transport().register_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_error_falls_back_to_initial_data() {
        let (tx, rx) = mpsc::channel(8);
        let query = client(vec![Step::Stream(rx)])
            .live_query(
                LiveQueryOptions::new(request("{ x }")).with_initial_data(json!("initial")),
            )
            .unwrap();
        assert_eq!(query.data(), Some(json!("initial")));

        tx.send(StreamEvent::Open).await.unwrap();
        tx.send(StreamEvent::Update(UpdateData::new(json!("fresh")))).await.unwrap();
        wait_for(&query, |s| s.data.is_some()).await;
        assert_eq!(query.data(), Some(json!("fresh")));

        tx.send(StreamEvent::ChannelError(ChannelErrorData::new("SLOW", "m", false)))
            .await
            .unwrap();
        wait_for(&query, |s| s.error.is_some()).await;

        assert_eq!(query.status(), ConnectionStatus::Connected);
        assert_eq!(query.data(), Some(json!("initial")));
        assert_eq!(query.watch().borrow().data, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_options_resubscribes_once_on_change() {
        let (tx1, rx1) = mpsc::channel(8);
        let (_tx2, rx2) = mpsc::channel(8);
        let query = client(vec![Step::Stream(rx1), Step::Stream(rx2)])
            .live_query(LiveQueryOptions::new(request("{ a }").with_variables(json!({ "n": 1 }))))
            .unwrap();
        tx1.send(StreamEvent::Open).await.unwrap();
        wait_for(&query, |s| s.status == ConnectionStatus::Connected).await;

        // Equal by value: nothing happens.
        let same = LiveQueryOptions::new(request("{ a }").with_variables(json!({ "n": 1 })))
            .with_initial_data(json!(0));
        assert!(!query.set_options(same).unwrap());
        assert_eq!(query.options().initial_data, Some(json!(0)));

        let changed = LiveQueryOptions::new(request("{ a }").with_variables(json!({ "n": 2 })));
        assert!(query.set_options(changed).unwrap());
        assert_eq!(query.status(), ConnectionStatus::Connecting);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(query.client.transport().register_count(), 2);
        // The old stream was closed.
        assert!(tx1.is_closed());
    }

    #[test]
    fn test_failed_resubscribe_can_be_retried() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let query = client(vec![])
            .live_query(LiveQueryOptions::<JsonValue>::disabled())
            .unwrap();
        let enabled = LiveQueryOptions::new(request("{ a }"));

        // No runtime on this thread: spawning fails.
        let result = query.set_options(enabled.clone());
        assert!(matches!(result, Err(ListenError::ConfigurationError(_))));
        assert_eq!(query.status(), ConnectionStatus::Closed);
        assert!(!query.options().enabled);

        let result = query.set_options(enabled.clone());
        assert!(matches!(result, Err(ListenError::ConfigurationError(_))));

        let _guard = runtime.enter();
        assert!(query.set_options(enabled).unwrap());
        assert_eq!(query.status(), ConnectionStatus::Connecting);
        assert!(query.options().enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_is_ignored() {
        let (_tx, rx) = mpsc::channel(8);
        let query = client(vec![Step::Stream(rx)])
            .live_query(LiveQueryOptions::new(request("{ a }")))
            .unwrap();

        let stale = query.handlers(0);
        stale.emit_update(UpdateData::new(json!("stale")));
        stale.emit_status_change(ConnectionStatus::Connected);

        assert_eq!(query.watch().borrow().data, None);
        assert_eq!(query.status(), ConnectionStatus::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabling_closes_connection() {
        let (tx, rx) = mpsc::channel(8);
        let query = client(vec![Step::Stream(rx)])
            .live_query(LiveQueryOptions::new(request("{ a }")))
            .unwrap();
        tx.send(StreamEvent::Open).await.unwrap();
        wait_for(&query, |s| s.status == ConnectionStatus::Connected).await;

        let disabled = query.options().with_enabled(false);
        assert!(query.set_options(disabled).unwrap());
        assert_eq!(query.status(), ConnectionStatus::Closed);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(tx.is_closed());
        assert_eq!(query.status(), ConnectionStatus::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_unsubscribes() {
        let (tx, rx) = mpsc::channel(8);
        let query = client(vec![Step::Stream(rx)])
            .live_query(LiveQueryOptions::new(request("{ a }")))
            .unwrap();
        tx.send(StreamEvent::Open).await.unwrap();
        wait_for(&query, |s| s.status == ConnectionStatus::Connected).await;

        drop(query);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(tx.is_closed());
    }
}
