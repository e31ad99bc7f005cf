use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

use crate::error::{ListenError, Result};

/// A query subscription request.
///
/// Only `query` and `token` are required. Everything else falls back to the
/// [`ConnectionOptions`](super::ConnectionOptions) of the client performing
/// the subscription.
///
/// `PartialEq` compares by value, so two requests built from the same query,
/// variables and credentials are equal even when they are distinct
/// allocations. [`LiveQuery`](crate::LiveQuery) relies on this to decide
/// whether a re-subscription is needed.
///
/// # Example
///
/// ```rust
/// use listen_link::SubscriptionRequest;
/// use serde_json::json;
///
/// let request = SubscriptionRequest::new("query { allPosts { title } }", "api-token")
///     .with_variables(json!({ "first": 10 }))
///     .with_environment("staging")
///     .with_preview(true);
/// assert!(request.validate().is_ok());
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    /// GraphQL query to subscribe to
    pub query: String,

    /// Query variables (must be a JSON object when present)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<JsonValue>,

    /// API token sent as `Authorization: Bearer <token>`
    pub token: String,

    /// Use the draft-content endpoint (`/preview` suffix)
    #[serde(default)]
    pub preview: bool,

    /// Named environment, inserted as `/environments/<name>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    /// Override the service origin for this request only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Base reconnection period in milliseconds (grows linearly per failed attempt)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnection_period_ms: Option<u64>,
}

impl fmt::Debug for SubscriptionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRequest")
            .field("query", &self.query)
            .field("variables", &self.variables)
            .field("token", &"<redacted>")
            .field("preview", &self.preview)
            .field("environment", &self.environment)
            .field("base_url", &self.base_url)
            .field("reconnection_period_ms", &self.reconnection_period_ms)
            .finish()
    }
}

impl SubscriptionRequest {
    /// Create a request with the two required fields.
    pub fn new(query: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: None,
            token: token.into(),
            preview: false,
            environment: None,
            base_url: None,
            reconnection_period_ms: None,
        }
    }

    /// Set the query variables.
    pub fn with_variables(mut self, variables: JsonValue) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Subscribe to draft content instead of published content.
    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    /// Target a named environment instead of the primary one.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Override the service origin.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the base reconnection period in milliseconds.
    pub fn with_reconnection_period_ms(mut self, period_ms: u64) -> Self {
        self.reconnection_period_ms = Some(period_ms);
        self
    }

    /// Check the request before any network activity happens.
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(ListenError::ConfigurationError(
                "query must not be empty".to_string(),
            ));
        }

        if self.token.trim().is_empty() {
            return Err(ListenError::ConfigurationError(
                "token must not be empty".to_string(),
            ));
        }

        if let Some(variables) = &self.variables {
            if !variables.is_object() {
                return Err(ListenError::ConfigurationError(format!(
                    "variables must be a JSON object (found {})",
                    json_kind(variables)
                )));
            }
        }

        if let Some(environment) = &self.environment {
            let environment = environment.trim();
            if environment.is_empty() || environment.contains('/') {
                return Err(ListenError::ConfigurationError(format!(
                    "Invalid environment name '{}'",
                    environment
                )));
            }
        }

        if let Some(base_url) = &self.base_url {
            validate_base_url(base_url)?;
        }

        if self.reconnection_period_ms == Some(0) {
            return Err(ListenError::ConfigurationError(
                "reconnection_period_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Reject anything that is not an absolute http(s) URL with a host.
pub(crate) fn validate_base_url(base_url: &str) -> Result<()> {
    let url = Url::parse(base_url.trim()).map_err(|e| {
        ListenError::ConfigurationError(format!("Invalid base_url '{}': {}", base_url, e))
    })?;

    match url.scheme() {
        "http" | "https" => {},
        other => {
            return Err(ListenError::ConfigurationError(format!(
                "Unsupported base_url scheme '{}'; expected http or https",
                other
            )));
        },
    }

    if url.host_str().is_none() {
        return Err(ListenError::ConfigurationError("base_url must include a host".to_string()));
    }

    if url.query().is_some() || url.fragment().is_some() {
        return Err(ListenError::ConfigurationError(
            "base_url must not include query parameters or fragments".to_string(),
        ));
    }

    Ok(())
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
