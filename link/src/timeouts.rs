//! Timeout configuration for listen-link operations.
//!
//! Covers the registration handshake, opening the event stream and
//! detecting a silent stream. The backoff between reconnection attempts is
//! not a timeout and lives in [`ConnectionOptions`](crate::ConnectionOptions).

use std::time::Duration;

/// Timeout configuration for subscription operations.
///
/// # Examples
///
/// ```rust
/// use listen_link::ListenTimeouts;
/// use std::time::Duration;
///
/// // Use defaults (recommended for most cases)
/// let timeouts = ListenTimeouts::default();
///
/// // Custom timeouts for high-latency environments
/// let timeouts = ListenTimeouts::builder()
///     .connection_timeout(Duration::from_secs(60))
///     .registration_timeout(Duration::from_secs(90))
///     .build();
///
/// // Aggressive timeouts for local development
/// let timeouts = ListenTimeouts::fast();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenTimeouts {
    /// Timeout for establishing connections (TCP + TLS handshake).
    /// Default: 10 seconds
    pub connection_timeout: Duration,

    /// Timeout for the whole registration POST, including the response body.
    /// Default: 30 seconds
    pub registration_timeout: Duration,

    /// Timeout for receiving the response headers of the event stream.
    /// Default: 30 seconds
    pub stream_open_timeout: Duration,

    /// Maximum silence on an open event stream before it is treated as dropped.
    /// Set to 0 to wait indefinitely.
    /// Default: 0 (disabled)
    pub receive_timeout: Duration,
}

impl Default for ListenTimeouts {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(10),
            registration_timeout: Duration::from_secs(30),
            stream_open_timeout: Duration::from_secs(30),
            receive_timeout: Duration::ZERO, // Disabled by default
        }
    }
}

impl ListenTimeouts {
    /// Create a new builder for custom timeout configuration.
    pub fn builder() -> ListenTimeoutsBuilder {
        ListenTimeoutsBuilder::new()
    }

    /// Create timeouts optimized for fast local development.
    pub fn fast() -> Self {
        Self {
            connection_timeout: Duration::from_secs(2),
            registration_timeout: Duration::from_secs(5),
            stream_open_timeout: Duration::from_secs(5),
            receive_timeout: Duration::ZERO,
        }
    }

    /// Create timeouts optimized for high-latency or unreliable networks.
    pub fn relaxed() -> Self {
        Self {
            connection_timeout: Duration::from_secs(30),
            registration_timeout: Duration::from_secs(120),
            stream_open_timeout: Duration::from_secs(120),
            receive_timeout: Duration::ZERO,
        }
    }

    /// Check if a duration represents "no timeout" (zero or very large).
    pub fn is_no_timeout(duration: Duration) -> bool {
        duration.is_zero() || duration > Duration::from_secs(86400 * 365) // > 1 year
    }
}

/// Builder for creating custom [`ListenTimeouts`] configurations.
#[derive(Debug, Clone)]
pub struct ListenTimeoutsBuilder {
    timeouts: ListenTimeouts,
}

impl ListenTimeoutsBuilder {
    fn new() -> Self {
        Self {
            timeouts: ListenTimeouts::default(),
        }
    }

    /// Set the connection timeout (TCP + TLS handshake).
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connection_timeout = timeout;
        self
    }

    /// Set the connection timeout in seconds.
    pub fn connection_timeout_secs(self, secs: u64) -> Self {
        self.connection_timeout(Duration::from_secs(secs))
    }

    /// Set the registration request timeout.
    pub fn registration_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.registration_timeout = timeout;
        self
    }

    /// Set the registration request timeout in seconds.
    pub fn registration_timeout_secs(self, secs: u64) -> Self {
        self.registration_timeout(Duration::from_secs(secs))
    }

    /// Set the event stream open timeout.
    pub fn stream_open_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.stream_open_timeout = timeout;
        self
    }

    /// Set the event stream open timeout in seconds.
    pub fn stream_open_timeout_secs(self, secs: u64) -> Self {
        self.stream_open_timeout(Duration::from_secs(secs))
    }

    /// Set the receive timeout for an open stream.
    /// Set to 0 to disable.
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.receive_timeout = timeout;
        self
    }

    /// Set the receive timeout in seconds.
    /// Set to 0 to disable.
    pub fn receive_timeout_secs(self, secs: u64) -> Self {
        self.receive_timeout(Duration::from_secs(secs))
    }

    /// Build the timeout configuration.
    pub fn build(self) -> ListenTimeouts {
        self.timeouts
    }
}
