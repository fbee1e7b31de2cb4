//! Saga error types.

use inventory::InventoryError;
use thiserror::Error;

/// Errors that can occur while consuming order events or publishing results.
#[derive(Debug, Error)]
pub enum SagaError {
    /// An inbound message body could not be decoded.
    #[error("Failed to decode message: {0}")]
    Decode(#[from] serde_json::Error),

    /// The inventory ledger rejected or failed the stock update.
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// The result event could not be handed to the broker.
    #[error("Failed to publish message: {0}")]
    Publish(String),

    /// The broker connection or channel failed.
    #[error("Broker error: {0}")]
    Broker(#[from] lapin::Error),

    /// The consumer task panicked or was aborted.
    #[error("Consumer task failed: {0}")]
    Worker(String),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
