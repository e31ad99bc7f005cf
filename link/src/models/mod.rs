//! Data models for listen-link.
//!
//! Defines the subscription request, the registration handshake response,
//! the payloads carried by the event stream and client-level options.

pub mod channel_error_data;
pub mod connection_options;
pub mod connection_status;
pub mod registration;
pub mod subscription_request;
pub mod update_data;


pub use channel_error_data::{ChannelErrorData, INVALID_EVENT_PAYLOAD};
pub use connection_options::{ConnectionOptions, DEFAULT_BASE_URL};
pub use connection_status::ConnectionStatus;
pub use registration::Registration;
pub use subscription_request::SubscriptionRequest;
pub use update_data::{UpdateData, UpdateResponse};
