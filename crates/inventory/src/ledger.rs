use std::collections::HashMap;

use async_trait::async_trait;

use crate::{InventoryError, NewProduct, Product, ProductId, Result, StockDecrement};

/// Authoritative owner of stock counts.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Inserts a new product row. Storage assigns the identifier.
    async fn create_product(&self, product: NewProduct) -> Result<Product>;

    /// Single-row point lookup.
    ///
    /// Returns `NotFound` if no row has this identifier.
    async fn read_by_id(&self, id: &ProductId) -> Result<Product>;

    /// Decrements stock for every line of one order, atomically.
    ///
    /// Either every row drops by exactly its requested quantity, or nothing
    /// changes. Fails with `InsufficientStock` naming the first line (in
    /// request order) that cannot be satisfied.
    ///
    /// Returns the touched product ids in first-appearance order, without
    /// duplicates, so callers can invalidate cached snapshots.
    async fn decrement_for_order(&self, items: &[StockDecrement]) -> Result<Vec<ProductId>>;
}

/// New stock level for one product, computed while its row is locked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockUpdate {
    pub product_id: ProductId,
    pub stock_quantity: i32,
}

/// Rejects line items with a zero or negative quantity.
pub fn validate_decrements(items: &[StockDecrement]) -> Result<()> {
    for item in items {
        if item.quantity <= 0 {
            return Err(InventoryError::InvalidQuantity {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
            });
        }
    }
    Ok(())
}

/// Canonical order in which rows of a batch are locked: sorted, deduplicated.
///
/// Two batches touching the same products always lock them in the same order,
/// whatever order their line items were listed in.
pub fn lock_order(items: &[StockDecrement]) -> Vec<ProductId> {
    let mut ids: Vec<ProductId> = items.iter().map(|i| i.product_id.clone()).collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Evaluates a batch against locked stock levels.
///
/// Lines are checked in request order; a product listed twice sees what the
/// earlier line left. The returned updates follow first-appearance order.
pub fn plan_decrements(
    items: &[StockDecrement],
    on_hand: &HashMap<ProductId, i32>,
) -> Result<Vec<StockUpdate>> {
    let mut remaining: HashMap<&ProductId, i32> = HashMap::new();
    let mut touched: Vec<&ProductId> = Vec::new();

    for item in items {
        let current = match remaining.get(&item.product_id) {
            Some(stock) => *stock,
            None => *on_hand
                .get(&item.product_id)
                .ok_or_else(|| InventoryError::NotFound(item.product_id.clone()))?,
        };

        if current < item.quantity {
            return Err(InventoryError::InsufficientStock {
                product_id: item.product_id.clone(),
                available: current,
                requested: item.quantity,
            });
        }

        if !remaining.contains_key(&item.product_id) {
            touched.push(&item.product_id);
        }
        remaining.insert(&item.product_id, current - item.quantity);
    }

    Ok(touched
        .into_iter()
        .map(|id| StockUpdate {
            product_id: id.clone(),
            stock_quantity: remaining[id],
        })
        .collect())
}
