//! Transport seam between the supervisor and the network.
//!
//! The supervisor only needs two operations: register a query and open the
//! event stream for a registration. [`HttpTransport`] performs both over
//! HTTP; tests and embedders can supply their own implementation.

use crate::{
    error::Result,
    event_stream::{EventStreamConnector, StreamHandle},
    models::{ConnectionOptions, Registration, SubscriptionRequest},
    registration::RegistrationClient,
    timeouts::ListenTimeouts,
};
use async_trait::async_trait;

/// Registration + event stream operations used by the supervisor.
#[async_trait]
pub trait ListenTransport: Send + Sync + 'static {
    /// Perform the registration handshake for a request.
    async fn register(&self, request: &SubscriptionRequest) -> Result<Registration>;

    /// Open the event stream for a registration.
    async fn connect(&self, base_url: &str, registration: &Registration) -> Result<StreamHandle>;
}

/// HTTP implementation of [`ListenTransport`].
#[derive(Clone, Debug)]
pub struct HttpTransport {
    registration: RegistrationClient,
    connector: EventStreamConnector,
}

impl HttpTransport {
    /// Build a transport sharing one `reqwest::Client` for both operations.
    pub fn new(
        http_client: reqwest::Client,
        options: &ConnectionOptions,
        timeouts: ListenTimeouts,
    ) -> Self {
        Self {
            registration: RegistrationClient::new(
                http_client.clone(),
                options.base_url.clone(),
                timeouts.clone(),
            ),
            connector: EventStreamConnector::new(
                http_client,
                timeouts,
                options.event_channel_capacity,
            ),
        }
    }

    /// The registration half.
    pub fn registration_client(&self) -> &RegistrationClient {
        &self.registration
    }

    /// The event stream half.
    pub fn connector(&self) -> &EventStreamConnector {
        &self.connector
    }
}

#[async_trait]
impl ListenTransport for HttpTransport {
    async fn register(&self, request: &SubscriptionRequest) -> Result<Registration> {
        self.registration.register(request).await
    }

    async fn connect(&self, base_url: &str, registration: &Registration) -> Result<StreamHandle> {
        self.connector.connect(base_url, registration).await
    }
}
