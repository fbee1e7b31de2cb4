//! Inventory ledger and product catalog.
//!
//! - [`InventoryLedger`]: authoritative stock counts with an atomic
//!   multi-item decrement, backed by PostgreSQL or memory
//! - [`ProductCache`]: best-effort snapshot cache over a [`CacheStore`],
//!   shared across instances through [`RedisCacheStore`]
//! - [`ProductService`]: cache-aside reads and decrement-then-invalidate

pub mod cache;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod product;
pub mod redis_store;
pub mod service;

pub use cache::{CacheStore, DEFAULT_PRODUCT_TTL, InMemoryCacheStore, ProductCache};
pub use common::ProductId;
pub use error::{CacheError, InventoryError, Result};
pub use ledger::{InventoryLedger, StockUpdate};
pub use memory::InMemoryInventoryLedger;
pub use postgres::PostgresInventoryLedger;
pub use product::{NewProduct, Product, StockDecrement};
pub use redis_store::RedisCacheStore;
pub use service::ProductService;
