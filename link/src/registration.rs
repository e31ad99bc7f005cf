//! Registration handshake over HTTP.
//!
//! POSTs the query and its variables to the registration endpoint and
//! returns the [`Registration`] id that scopes the event stream.

use crate::{
    error::{ListenError, Result},
    models::{Registration, SubscriptionRequest},
    timeouts::ListenTimeouts,
};
use log::{debug, warn};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::time::Instant;

/// JSON body of the registration POST.
#[derive(Debug, Serialize)]
struct RegistrationBody<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<&'a JsonValue>,
}

/// Build the registration endpoint:
/// `{base_url}[/environments/{environment}][/preview]`.
pub fn registration_endpoint(base_url: &str, environment: Option<&str>, preview: bool) -> String {
    let mut endpoint = base_url.trim().trim_end_matches('/').to_string();

    if let Some(environment) = environment.map(str::trim).filter(|e| !e.is_empty()) {
        endpoint.push_str("/environments/");
        endpoint.push_str(environment);
    }

    if preview {
        endpoint.push_str("/preview");
    }

    endpoint
}

/// Whether a `Content-Type` header value names JSON.
///
/// Media type parameters (`; charset=utf-8`) are ignored.
fn is_json_content_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .map(|media_type| media_type.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

/// Performs the registration handshake.
#[derive(Clone, Debug)]
pub struct RegistrationClient {
    http_client: reqwest::Client,
    default_base_url: String,
    timeouts: ListenTimeouts,
}

impl RegistrationClient {
    pub(crate) fn new(
        http_client: reqwest::Client,
        default_base_url: String,
        timeouts: ListenTimeouts,
    ) -> Self {
        Self {
            http_client,
            default_base_url,
            timeouts,
        }
    }

    /// Service origin for a request: its own override or the client default.
    pub fn base_url_for<'a>(&'a self, request: &'a SubscriptionRequest) -> &'a str {
        request.base_url.as_deref().unwrap_or(&self.default_base_url)
    }

    /// Registration endpoint for a request.
    pub fn endpoint(&self, request: &SubscriptionRequest) -> String {
        registration_endpoint(
            self.base_url_for(request),
            request.environment.as_deref(),
            request.preview,
        )
    }

    /// Register the query and return the registration id.
    ///
    /// Succeeds only on HTTP 200 with a JSON content type and a body of the
    /// form `{"id": "..."}`. Every other outcome is a
    /// [`ListenError::RegistrationError`]; the caller is expected to retry.
    pub async fn register(&self, request: &SubscriptionRequest) -> Result<Registration> {
        let url = self.endpoint(request);
        let body = RegistrationBody {
            query: &request.query,
            variables: request.variables.as_ref(),
        };

        let mut req_builder = self
            .http_client
            .post(&url)
            .bearer_auth(&request.token)
            .header(ACCEPT, "application/json")
            .json(&body);

        if !ListenTimeouts::is_no_timeout(self.timeouts.registration_timeout) {
            req_builder = req_builder.timeout(self.timeouts.registration_timeout);
        }

        let start = Instant::now();
        debug!("[LISTEN_REGISTER] Sending POST to {}", url);

        let response = req_builder.send().await.map_err(|e| {
            warn!(
                "[LISTEN_REGISTER] Request failed: {} duration_ms={}",
                e,
                start.elapsed().as_millis()
            );
            ListenError::RegistrationError(format!("Request to {} failed: {}", url, e))
        })?;

        let status = response.status();
        debug!(
            "[LISTEN_REGISTER] Response received: status={} duration_ms={}",
            status,
            start.elapsed().as_millis()
        );

        if status != StatusCode::OK {
            warn!("[LISTEN_REGISTER] Invalid response code {} from {}", status, url);
            return Err(ListenError::RegistrationError(format!(
                "Invalid response code {}",
                status.as_u16()
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !is_json_content_type(&content_type) {
            warn!(
                "[LISTEN_REGISTER] Invalid content type '{}' from {}",
                content_type, url
            );
            return Err(ListenError::RegistrationError(format!(
                "Invalid content type '{}'",
                content_type
            )));
        }

        let registration: Registration = response.json().await.map_err(|e| {
            ListenError::RegistrationError(format!("Invalid registration body: {}", e))
        })?;

        if registration.id.trim().is_empty() {
            return Err(ListenError::RegistrationError(
                "Registration id is empty".to_string(),
            ));
        }

        debug!(
            "[LISTEN_REGISTER] Registered id={} total_ms={}",
            registration.id,
            start.elapsed().as_millis()
        );

        Ok(registration)
    }
}
