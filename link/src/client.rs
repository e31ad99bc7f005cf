//! Subscription client with builder pattern.
//!
//! Provides the primary interface for starting real-time query
//! subscriptions against the listen service.

use crate::{
    error::{ListenError, Result},
    event_handlers::SubscriptionHandlers,
    live::{LiveQuery, LiveQueryOptions},
    models::{subscription_request::validate_base_url, ConnectionOptions, SubscriptionRequest},
    subscription::{self, UnsubscribeHandle},
    timeouts::ListenTimeouts,
    transport::{HttpTransport, ListenTransport},
};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Main subscription client.
///
/// Use [`ListenClientBuilder`] to construct instances with custom
/// configuration. Cloning is cheap and clones share the HTTP connection pool.
///
/// # Examples
///
/// ```rust,no_run
/// use listen_link::{ListenClient, SubscriptionHandlers, SubscriptionRequest};
///
/// # async fn example() -> listen_link::Result<()> {
/// let client = ListenClient::builder()
///     .base_url("https://graphql-listen.example.com")
///     .build()?;
///
/// let request = SubscriptionRequest::new("{ allPosts { title } }", "token");
/// let handlers = SubscriptionHandlers::<serde_json::Value>::new()
///     .on_update(|update| println!("{}", update.response.data));
///
/// let handle = client.subscribe(request, handlers).await?;
/// // ...
/// handle.unsubscribe();
/// # Ok(())
/// # }
/// ```
pub struct ListenClient<Tr = HttpTransport> {
    transport: Arc<Tr>,
    options: ConnectionOptions,
}

impl<Tr> Clone for ListenClient<Tr> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            options: self.options.clone(),
        }
    }
}

impl<Tr> std::fmt::Debug for ListenClient<Tr> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenClient")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ListenClient<HttpTransport> {
    /// Create a new builder for configuring the client
    pub fn builder() -> ListenClientBuilder {
        ListenClientBuilder::new()
    }
}

impl<Tr: ListenTransport> ListenClient<Tr> {
    /// Use a custom transport (for example an in-process fake).
    ///
    /// `options.base_url` is still used to resolve requests that do not carry
    /// their own `base_url`.
    pub fn with_transport(transport: Tr, options: ConnectionOptions) -> Result<Self> {
        validate_base_url(&options.base_url)?;
        Ok(Self {
            transport: Arc::new(transport),
            options,
        })
    }

    /// Client-level connection options.
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// The transport shared by every subscription of this client.
    pub fn transport(&self) -> &Tr {
        &self.transport
    }

    /// Start a subscription and return its handle immediately.
    ///
    /// Must be called from within a tokio runtime. Only configuration errors
    /// are returned; network failures are retried in the background.
    pub fn spawn_subscription<T>(
        &self,
        request: SubscriptionRequest,
        handlers: SubscriptionHandlers<T>,
    ) -> Result<UnsubscribeHandle>
    where
        T: DeserializeOwned + Send + 'static,
    {
        subscription::spawn_subscription(self.transport.clone(), request, &self.options, handlers)
    }

    /// Start a subscription and wait until it first connects.
    ///
    /// Also resolves if the subscription is closed by a fatal channel error
    /// before it ever connected. While the service is unreachable the
    /// returned future keeps waiting. Dropping it before it resolves (for
    /// example through `tokio::time::timeout`) unsubscribes.
    pub async fn subscribe<T>(
        &self,
        request: SubscriptionRequest,
        handlers: SubscriptionHandlers<T>,
    ) -> Result<UnsubscribeHandle>
    where
        T: DeserializeOwned + Send + 'static,
    {
        subscription::subscribe_and_wait(self.transport.clone(), request, &self.options, handlers)
            .await
    }

    /// Create a stateful [`LiveQuery`] bound to this client.
    pub fn live_query<T>(&self, options: LiveQueryOptions<T>) -> Result<LiveQuery<T, Tr>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        LiveQuery::new(self.clone(), options)
    }
}

/// Subscribe using a client built from default settings.
///
/// The request's own `base_url` takes precedence over the default origin.
pub async fn subscribe_to_query<T>(
    request: SubscriptionRequest,
    handlers: SubscriptionHandlers<T>,
) -> Result<UnsubscribeHandle>
where
    T: DeserializeOwned + Send + 'static,
{
    ListenClient::builder().build()?.subscribe(request, handlers).await
}

/// Builder for [`ListenClient`].
#[derive(Debug, Clone, Default)]
pub struct ListenClientBuilder {
    base_url: Option<String>,
    connection_options: ConnectionOptions,
    timeouts: ListenTimeouts,
    http_client: Option<reqwest::Client>,
}

impl ListenClientBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service origin.
    ///
    /// Overrides the `base_url` of [`connection_options`](Self::connection_options).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the default delay between reconnection attempts in milliseconds.
    pub fn reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.connection_options.reconnect_delay_ms = delay_ms;
        self
    }

    /// Set comprehensive timeout configuration for all operations
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use listen_link::{ListenClient, ListenTimeouts};
    ///
    /// # fn example() -> listen_link::Result<()> {
    /// let client = ListenClient::builder()
    ///     .base_url("http://localhost:4000")
    ///     .timeouts(ListenTimeouts::fast())
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn timeouts(mut self, timeouts: ListenTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set connection options (origin, backoff, queue capacity).
    pub fn connection_options(mut self, options: ConnectionOptions) -> Self {
        self.connection_options = options;
        self
    }

    /// Use a preconfigured `reqwest::Client` (proxies, custom roots, ...).
    ///
    /// The connection timeout of [`ListenTimeouts`] is then left to that client.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<ListenClient> {
        let mut options = self.connection_options;
        if let Some(base_url) = self.base_url {
            options.base_url = base_url;
        }
        validate_base_url(&options.base_url)?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => {
                // No client-wide request timeout: it would also cut the
                // long-lived event stream body.
                let mut client_builder = reqwest::Client::builder()
                    .user_agent(concat!("listen-link/", env!("CARGO_PKG_VERSION")));
                if !ListenTimeouts::is_no_timeout(self.timeouts.connection_timeout) {
                    client_builder = client_builder.connect_timeout(self.timeouts.connection_timeout);
                }
                client_builder
                    .build()
                    .map_err(|e| ListenError::ConfigurationError(e.to_string()))?
            },
        };

        log::debug!("[CLIENT] Built listen client for {}", options.base_url);

        let transport = HttpTransport::new(http_client, &options, self.timeouts);
        Ok(ListenClient {
            transport: Arc::new(transport),
            options,
        })
    }
}
