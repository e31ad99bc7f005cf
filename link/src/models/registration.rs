use serde::{Deserialize, Serialize};

/// Server-issued identifier for a registered query.
///
/// Consumed once to build the event stream URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Registration id used in `/events/{id}`
    pub id: String,
}
