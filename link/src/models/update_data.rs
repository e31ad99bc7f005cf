use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Payload of an `update` event: the latest query result.
///
/// Each update replaces the previous result wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateData<T = JsonValue> {
    /// The raw GraphQL response
    pub response: UpdateResponse<T>,
}

/// GraphQL response envelope carried by [`UpdateData`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateResponse<T = JsonValue> {
    /// GraphQL `data` property
    pub data: T,
}

impl<T> UpdateData<T> {
    /// Wrap a query result.
    pub fn new(data: T) -> Self {
        Self {
            response: UpdateResponse { data },
        }
    }

    /// Take the query result out of the envelope.
    pub fn into_data(self) -> T {
        self.response.data
    }
}

impl UpdateData<JsonValue> {
    /// Re-interpret the untyped payload as the caller's result type.
    pub fn decode<T: serde::de::DeserializeOwned>(self) -> Result<UpdateData<T>, serde_json::Error> {
        let data = serde_json::from_value(self.response.data)?;
        Ok(UpdateData::new(data))
    }
}
