use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection status of a subscription, as seen by the caller.
///
/// ```text
/// connecting --(open)--> connected
/// connecting --(failure, backoff)--> connecting
/// connected  --(transport drop)--> connecting
/// connected  --(fatal channel error | unsubscribe)--> closed
/// ```
///
/// `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Registration or stream connection in progress (including backoff waits).
    #[default]
    Connecting,
    /// The event stream is open.
    Connected,
    /// Terminated by a fatal channel error or an explicit unsubscribe.
    Closed,
}

impl ConnectionStatus {
    /// Whether no further transitions can happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionStatus::Closed)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Closed => write!(f, "closed"),
        }
    }
}
