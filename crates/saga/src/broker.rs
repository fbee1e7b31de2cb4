//! Broker seams: inbound deliveries and outbound result publishing.
//!
//! The handler only sees these types; [`crate::amqp`] adapts RabbitMQ to
//! them and the in-memory versions here back the tests.

use std::pin::Pin;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use tokio::sync::mpsc;

use crate::error::{Result, SagaError};
use crate::events::StockUpdateResult;
use crate::propagation::MessageHeaders;

/// A delivery taken off the order-created queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub body: Bytes,
    pub headers: MessageHeaders,
}

impl InboundMessage {
    pub fn new(body: impl Into<Bytes>, headers: MessageHeaders) -> Self {
        Self {
            body: body.into(),
            headers,
        }
    }
}

/// A stream of inbound deliveries.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<InboundMessage>> + Send>>;

/// Sends stock update results onto the bus.
#[async_trait]
pub trait ResultPublisher: Send + Sync {
    /// Publishes one result with the given metadata attached.
    ///
    /// Not retried by callers; an error here leaves the saga unresolved.
    async fn publish(&self, result: &StockUpdateResult, headers: MessageHeaders) -> Result<()>;
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    published: Vec<(StockUpdateResult, MessageHeaders)>,
    fail_on_publish: bool,
}

/// In-memory result publisher for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryResultPublisher {
    state: Arc<Mutex<InMemoryPublisherState>>,
}

impl InMemoryResultPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the publisher to reject every publish.
    pub fn set_fail_on_publish(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_on_publish = fail;
        }
    }

    /// Everything published so far, oldest first.
    pub fn published(&self) -> Vec<(StockUpdateResult, MessageHeaders)> {
        self.state
            .lock()
            .map(|state| state.published.clone())
            .unwrap_or_default()
    }

    pub fn published_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.published.len())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ResultPublisher for InMemoryResultPublisher {
    async fn publish(&self, result: &StockUpdateResult, headers: MessageHeaders) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| SagaError::Publish(e.to_string()))?;

        if state.fail_on_publish {
            return Err(SagaError::Publish("broker unreachable".to_string()));
        }

        state.published.push((result.clone(), headers));
        Ok(())
    }
}

/// Sending half of an in-memory queue.
#[derive(Debug, Clone)]
pub struct InMemoryQueue {
    sender: mpsc::UnboundedSender<Result<InboundMessage>>,
}

impl InMemoryQueue {
    /// Creates a queue and the stream that drains it.
    ///
    /// The stream ends once every `InMemoryQueue` clone is dropped.
    pub fn channel() -> (Self, MessageStream) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let stream = futures_util::stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|item| (item, receiver))
        });
        (Self { sender }, Box::pin(stream))
    }

    /// Enqueues a delivery. Returns false if the stream was dropped.
    pub fn push(&self, message: InboundMessage) -> bool {
        self.sender.send(Ok(message)).is_ok()
    }

    /// Enqueues a receive failure, as a broker would on a channel error.
    pub fn push_error(&self, error: SagaError) -> bool {
        self.sender.send(Err(error)).is_ok()
    }
}
