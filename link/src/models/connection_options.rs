use serde::{Deserialize, Serialize};

/// Default service origin for registration and event streams.
pub const DEFAULT_BASE_URL: &str = "https://graphql-listen.example.com";

/// Client-level connection options.
///
/// These apply to every subscription made through a
/// [`ListenClient`](crate::ListenClient) unless the individual
/// [`SubscriptionRequest`](super::SubscriptionRequest) overrides them.
///
/// # Example
///
/// ```rust
/// use listen_link::ConnectionOptions;
///
/// let options = ConnectionOptions::default()
///     .with_base_url("https://listen.internal:8443")
///     .with_reconnect_delay_ms(500)
///     .with_max_reconnect_delay_ms(Some(10_000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Service origin used when a request does not carry its own `base_url`
    /// Default: `https://graphql-listen.example.com`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Base delay in milliseconds between reconnection attempts.
    /// The n-th consecutive retry waits `n * reconnect_delay_ms`.
    /// Default: 1000ms (1 second)
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Ceiling for the linearly growing reconnection delay.
    /// Default: 30000ms. `None` lets the delay grow without bound.
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: Option<u64>,

    /// Capacity of the queue between the stream reader and the supervisor.
    /// When full, the reader stops pulling bytes off the connection.
    /// Default: 256
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_max_reconnect_delay_ms() -> Option<u64> {
    Some(30000)
}

fn default_event_channel_capacity() -> usize {
    256
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl ConnectionOptions {
    /// Create new connection options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default service origin
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the base delay between reconnection attempts (in milliseconds)
    pub fn with_reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_delay_ms = delay_ms;
        self
    }

    /// Set the ceiling for the reconnection delay (in milliseconds).
    /// Pass `None` for an uncapped delay.
    pub fn with_max_reconnect_delay_ms(mut self, max_delay_ms: Option<u64>) -> Self {
        self.max_reconnect_delay_ms = max_delay_ms;
        self
    }

    /// Set the capacity of the internal event queue
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }
}
