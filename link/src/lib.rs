//! # listen-link
//!
//! Client for a real-time query subscription service. A subscription
//! registers a GraphQL query over HTTP, opens a server-push event stream for
//! the returned registration id and delivers every new query result to the
//! caller. Dropped connections are re-established with a linearly growing
//! delay until the caller unsubscribes or the service reports a fatal error.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use listen_link::{ListenClient, SubscriptionHandlers, SubscriptionRequest};
//!
//! # async fn example() -> listen_link::Result<()> {
//! let client = ListenClient::builder().build()?;
//!
//! let request = SubscriptionRequest::new("{ allPosts { title } }", "read-token")
//!     .with_environment("staging");
//!
//! let handlers = SubscriptionHandlers::<serde_json::Value>::new()
//!     .on_status_change(|status| println!("status: {}", status))
//!     .on_update(|update| println!("data: {}", update.response.data))
//!     .on_channel_error(|error| eprintln!("error: {}", error));
//!
//! let handle = client.subscribe(request, handlers).await?;
//! // ...
//! handle.unsubscribe();
//! # Ok(())
//! # }
//! ```
//!
//! For state-style consumption see [`LiveQuery`].
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade with `[listen-link]` and
//! `[LISTEN_REGISTER]` prefixes; raw event stream frames are logged at
//! `trace` level. Install any `log` implementation to see them.

pub mod client;
pub mod error;
pub mod event_handlers;
pub mod event_stream;
pub mod live;
pub mod models;
pub mod reconnect;
pub mod registration;
pub mod subscription;
pub mod timeouts;
pub mod transport;

mod supervisor;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use client::{subscribe_to_query, ListenClient, ListenClientBuilder};
pub use error::{ListenError, Result};
pub use event_handlers::SubscriptionHandlers;
pub use event_stream::{EventStreamConnector, ReadyState, StreamEvent, StreamHandle};
pub use live::{LiveQuery, LiveQueryOptions, LiveQueryState};
pub use models::{
    ChannelErrorData, ConnectionOptions, ConnectionStatus, Registration, SubscriptionRequest,
    UpdateData, UpdateResponse,
};
pub use reconnect::ReconnectPolicy;
pub use registration::RegistrationClient;
pub use subscription::UnsubscribeHandle;
pub use timeouts::{ListenTimeouts, ListenTimeoutsBuilder};
pub use transport::{HttpTransport, ListenTransport};
