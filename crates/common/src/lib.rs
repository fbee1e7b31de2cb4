//! Identifier types shared across the product catalog crates.

pub mod types;

pub use types::{OrderId, PRODUCT_CACHE_PREFIX, ProductId};
