use thiserror::Error;

use crate::ProductId;

/// Errors that can occur when reading or mutating inventory.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// No product row exists with this identifier.
    #[error("Product not found: {0}")]
    NotFound(ProductId),

    /// A line item asked for more than is on hand.
    /// The whole batch was aborted; nothing was written.
    #[error(
        "insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        available: i32,
        requested: i32,
    },

    /// A line item carried a zero or negative quantity.
    #[error("invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: i32 },

    /// Product attributes rejected before reaching storage.
    #[error("Invalid product: {0}")]
    InvalidProduct(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl InventoryError {
    /// True for faults of the storage layer rather than business rule violations.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Migration(_))
    }
}

/// Result type for inventory operations.
pub type Result<T> = std::result::Result<T, InventoryError>;

/// Errors raised by a cache backend.
///
/// These never escape the read path; [`crate::ProductCache`] logs and swallows them.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
