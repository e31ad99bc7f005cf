//! Subscription event handlers.
//!
//! Callback hooks through which a subscription reports to its caller:
//!
//! - [`on_status_change`](SubscriptionHandlers::on_status_change): connection status transitions
//! - [`on_update`](SubscriptionHandlers::on_update): new query results
//! - [`on_channel_error`](SubscriptionHandlers::on_channel_error): errors reported by the service
//!
//! All handlers are invoked from the subscription's supervisor task, one at a
//! time, in the order the underlying events happened.
//!
//! # Example
//!
//! ```rust
//! use listen_link::SubscriptionHandlers;
//!
//! let handlers = SubscriptionHandlers::<serde_json::Value>::new()
//!     .on_status_change(|status| println!("status: {}", status))
//!     .on_update(|update| println!("data: {}", update.response.data))
//!     .on_channel_error(|error| eprintln!("channel error: {}", error));
//! ```

use crate::models::{ChannelErrorData, ConnectionStatus, UpdateData};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// Type alias for the on_status_change callback.
pub type OnStatusChangeCallback = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

/// Type alias for the on_update callback.
pub type OnUpdateCallback<T> = Arc<dyn Fn(UpdateData<T>) + Send + Sync>;

/// Type alias for the on_channel_error callback.
pub type OnChannelErrorCallback = Arc<dyn Fn(ChannelErrorData) + Send + Sync>;

/// Callbacks for a single subscription.
///
/// All handlers are optional.
pub struct SubscriptionHandlers<T = JsonValue> {
    pub(crate) on_status_change: Option<OnStatusChangeCallback>,
    pub(crate) on_update: Option<OnUpdateCallback<T>>,
    pub(crate) on_channel_error: Option<OnChannelErrorCallback>,
}

// Manual impls: derives would require `T: Clone` / `T: Default`.
impl<T> Clone for SubscriptionHandlers<T> {
    fn clone(&self) -> Self {
        Self {
            on_status_change: self.on_status_change.clone(),
            on_update: self.on_update.clone(),
            on_channel_error: self.on_channel_error.clone(),
        }
    }
}

impl<T> Default for SubscriptionHandlers<T> {
    fn default() -> Self {
        Self {
            on_status_change: None,
            on_update: None,
            on_channel_error: None,
        }
    }
}

impl<T> fmt::Debug for SubscriptionHandlers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandlers")
            .field("on_status_change", &self.on_status_change.is_some())
            .field("on_update", &self.on_update.is_some())
            .field("on_channel_error", &self.on_channel_error.is_some())
            .finish()
    }
}

impl<T> SubscriptionHandlers<T> {
    /// Create a new empty set of handlers (no callbacks registered).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked on every status transition.
    pub fn on_status_change(
        mut self,
        f: impl Fn(ConnectionStatus) + Send + Sync + 'static,
    ) -> Self {
        self.on_status_change = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked with each new query result.
    pub fn on_update(mut self, f: impl Fn(UpdateData<T>) + Send + Sync + 'static) -> Self {
        self.on_update = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked for every channel error, fatal or not.
    ///
    /// For fatal errors the status has already moved to
    /// [`ConnectionStatus::Closed`] when this fires.
    pub fn on_channel_error(
        mut self,
        f: impl Fn(ChannelErrorData) + Send + Sync + 'static,
    ) -> Self {
        self.on_channel_error = Some(Arc::new(f));
        self
    }

    // ---------------------------------------------------------------
    // Internal dispatch helpers
    // ---------------------------------------------------------------

    pub(crate) fn emit_status_change(&self, status: ConnectionStatus) {
        if let Some(cb) = &self.on_status_change {
            cb(status);
        }
    }

    pub(crate) fn emit_update(&self, update: UpdateData<T>) {
        if let Some(cb) = &self.on_update {
            cb(update);
        }
    }

    pub(crate) fn emit_channel_error(&self, error: ChannelErrorData) {
        if let Some(cb) = &self.on_channel_error {
            cb(error);
        }
    }
}
