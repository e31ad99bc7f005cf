#![allow(dead_code)]

use listen_link::{
    ChannelErrorData, ConnectionOptions, ConnectionStatus, ListenClient, ListenTimeouts,
    SubscriptionHandlers, SubscriptionRequest,
};
use serde_json::{json, Value as JsonValue};
use std::time::Duration;
use tokio::sync::mpsc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "read-token";
pub const QUERY: &str = "{ allPosts { title } }";

/// Client pointed at the mock server with a short reconnection period.
pub fn client_for(server: &MockServer) -> ListenClient {
    ListenClient::builder()
        .connection_options(
            ConnectionOptions::new()
                .with_base_url(server.uri())
                .with_reconnect_delay_ms(50)
                .with_max_reconnect_delay_ms(Some(200)),
        )
        .timeouts(ListenTimeouts::fast())
        .build()
        .expect("client")
}

pub fn request() -> SubscriptionRequest {
    SubscriptionRequest::new(QUERY, TOKEN)
}

/// `text/event-stream` body made of `(event, data)` frames.
pub fn sse_body(frames: &[(&str, JsonValue)]) -> String {
    frames
        .iter()
        .map(|(event, data)| format!("event: {}\ndata: {}\n\n", event, data))
        .collect()
}

pub fn sse_response(frames: &[(&str, JsonValue)]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(sse_body(frames), "text/event-stream")
}

pub fn update_frame(data: JsonValue) -> (&'static str, JsonValue) {
    ("update", json!({ "response": { "data": data } }))
}

pub fn channel_error_frame(code: &str, fatal: bool) -> (&'static str, JsonValue) {
    ("channelError", json!({ "code": code, "message": "m", "fatal": fatal }))
}

/// Registration endpoint at `route` answering with `{"id": id}`.
pub async fn mount_registration(server: &MockServer, route: &str, id: &str) {
    Mock::given(method("POST"))
        .and(path(route))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": id })))
        .mount(server)
        .await;
}

pub async fn mount_events(server: &MockServer, id: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/events/{}", id)))
        .and(header("accept", "text/event-stream"))
        .respond_with(response)
        .mount(server)
        .await;
}

pub async fn count_requests(server: &MockServer, verb: &str, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == verb && r.url.path() == route)
        .count()
}

/// Everything a subscription reported, as channels.
pub struct Observed {
    pub statuses: mpsc::UnboundedReceiver<ConnectionStatus>,
    pub updates: mpsc::UnboundedReceiver<JsonValue>,
    pub errors: mpsc::UnboundedReceiver<ChannelErrorData>,
}

pub fn observed_handlers() -> (SubscriptionHandlers<JsonValue>, Observed) {
    let (status_tx, statuses) = mpsc::unbounded_channel();
    let (update_tx, updates) = mpsc::unbounded_channel();
    let (error_tx, errors) = mpsc::unbounded_channel();

    let handlers = SubscriptionHandlers::new()
        .on_status_change(move |status| {
            let _ = status_tx.send(status);
        })
        .on_update(move |update| {
            let _ = update_tx.send(update.into_data());
        })
        .on_channel_error(move |error| {
            let _ = error_tx.send(error);
        });

    (handlers, Observed { statuses, updates, errors })
}

pub async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for callback")
        .expect("callback channel closed")
}
