//! Scripted in-process transport shared by unit tests.

use crate::{
    error::{ListenError, Result},
    event_stream::{StreamEvent, StreamHandle},
    models::{Registration, SubscriptionRequest},
    transport::ListenTransport,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// What the fake service does on the next registration.
pub(crate) enum Step {
    RegisterFails,
    /// Registration succeeds, opening the stream fails.
    ConnectFails,
    Stream(mpsc::Receiver<StreamEvent>),
}

/// Plays back a list of [`Step`]s; once exhausted, registration hangs.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    pending_stream: Mutex<Option<mpsc::Receiver<StreamEvent>>>,
    register_calls: Mutex<Vec<Instant>>,
    connect_calls: Mutex<usize>,
}

impl ScriptedTransport {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            ..Default::default()
        }
    }

    pub(crate) fn shared(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self::new(steps))
    }

    pub(crate) fn register_count(&self) -> usize {
        self.register_calls.lock().unwrap().len()
    }

    pub(crate) fn register_times(&self) -> Vec<Instant> {
        self.register_calls.lock().unwrap().clone()
    }

    pub(crate) fn connect_count(&self) -> usize {
        *self.connect_calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl ListenTransport for ScriptedTransport {
    async fn register(&self, _request: &SubscriptionRequest) -> Result<Registration> {
        self.register_calls.lock().unwrap().push(Instant::now());
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::RegisterFails) => {
                Err(ListenError::RegistrationError("Invalid response code 500".into()))
            },
            Some(Step::ConnectFails) => Ok(Registration { id: "abc".into() }),
            Some(Step::Stream(rx)) => {
                *self.pending_stream.lock().unwrap() = Some(rx);
                Ok(Registration { id: "abc".into() })
            },
            // Hang like an unresponsive service.
            None => std::future::pending().await,
        }
    }

    async fn connect(&self, _base_url: &str, registration: &Registration) -> Result<StreamHandle> {
        assert_eq!(registration.id, "abc");
        *self.connect_calls.lock().unwrap() += 1;
        let pending = self.pending_stream.lock().unwrap().take();
        match pending {
            Some(rx) => Ok(StreamHandle::from_receiver(rx)),
            None => Err(ListenError::StreamError("Event stream rejected with status 503".into())),
        }
    }
}
