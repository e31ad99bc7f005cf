//! Reconnection delay policy.
//!
//! The delay grows linearly with the number of consecutive failed attempts:
//! the n-th retry waits `n * base`, optionally clamped to a ceiling.

use crate::models::{ConnectionOptions, SubscriptionRequest};
use std::time::Duration;

/// Linear backoff with an optional ceiling.
///
/// The attempt number counts consecutive failures only. Once a stream has
/// reached `open`, the next drop is retried as attempt 1 again, so a long
/// lived subscription does not accumulate delay across unrelated outages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    base: Duration,
    max: Option<Duration>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_options(&ConnectionOptions::default())
    }
}

impl ReconnectPolicy {
    /// Create a policy. A zero `base` is bumped to one millisecond and a
    /// ceiling below `base` is raised to `base`.
    pub fn new(base: Duration, max: Option<Duration>) -> Self {
        let base = base.max(Duration::from_millis(1));
        Self {
            base,
            max: max.map(|max| max.max(base)),
        }
    }

    /// Policy from client-level options.
    pub fn from_options(options: &ConnectionOptions) -> Self {
        Self::new(
            Duration::from_millis(options.reconnect_delay_ms),
            options.max_reconnect_delay_ms.map(Duration::from_millis),
        )
    }

    /// Policy for one request: its own period overrides the client default.
    pub fn for_request(request: &SubscriptionRequest, options: &ConnectionOptions) -> Self {
        let base_ms = request.reconnection_period_ms.unwrap_or(options.reconnect_delay_ms);
        Self::new(
            Duration::from_millis(base_ms),
            options.max_reconnect_delay_ms.map(Duration::from_millis),
        )
    }

    /// Base period.
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Ceiling, if any.
    pub fn max(&self) -> Option<Duration> {
        self.max
    }

    /// Delay before retry number `attempt` (1-based). Attempt 0 waits nothing.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.base.saturating_mul(attempt);
        match self.max {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}
