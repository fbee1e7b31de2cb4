//! Stock reconciliation participant of the order fulfillment saga.
//!
//! The order service announces `OrderCreated` on a fanout exchange. This
//! crate consumes those events, applies the stock decrement atomically
//! through [`inventory::ProductService`], and publishes exactly one
//! [`StockUpdateResult`] per decoded order, carrying the inbound trace
//! context forward so both hops land in one distributed trace.
//!
//! Flow per delivery:
//! 1. Decode the body (undecodable messages are logged and dropped)
//! 2. Extract the trace context from the message headers
//! 3. Decrement stock for every line, all or nothing
//! 4. Publish the positive or negative result with the trace context injected

pub mod amqp;
pub mod broker;
pub mod consumer;
pub mod error;
pub mod events;
pub mod handler;
pub mod propagation;
pub mod state;
pub mod topology;

pub use amqp::{AmqpBroker, AmqpResultPublisher};
pub use broker::{
    InMemoryQueue, InMemoryResultPublisher, InboundMessage, MessageStream, ResultPublisher,
};
pub use consumer::{ConsumerHandle, DEFAULT_IN_FLIGHT_GRACE, start, start_with_grace};
pub use error::{Result, SagaError};
pub use events::{OrderCreated, OrderLine, StockUpdateResult};
pub use handler::{HandleOutcome, MessageHandler, StockReconciliationHandler};
pub use propagation::{MessageHeaders, extract_context, init_propagator, inject_context};
pub use state::ProcessingStage;
