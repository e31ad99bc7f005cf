use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Error code used when an event payload does not match its expected shape.
pub const INVALID_EVENT_PAYLOAD: &str = "INVALID_EVENT_PAYLOAD";

/// Application-level error delivered over the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelErrorData {
    /// Error code (e.g. `INVALID_QUERY`)
    pub code: String,

    /// Human-friendly explanation
    pub message: String,

    /// Fatal errors terminate the subscription; non-fatal ones are advisory
    pub fatal: bool,

    /// Raw error response, if available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<JsonValue>,
}

impl ChannelErrorData {
    /// Create a channel error without a raw response.
    pub fn new(code: impl Into<String>, message: impl Into<String>, fatal: bool) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            fatal,
            response: None,
        }
    }

    /// Non-fatal error reported when an event payload fails validation.
    pub fn invalid_payload(event: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            INVALID_EVENT_PAYLOAD,
            format!("Invalid '{}' event payload: {}", event, reason),
            false,
        )
    }
}

impl fmt::Display for ChannelErrorData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fatal {
            write!(f, "{} (fatal): {}", self.code, self.message)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}
