use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    InventoryError, NewProduct, Product, ProductId, Result, StockDecrement,
    ledger::{InventoryLedger, plan_decrements, validate_decrements},
};

/// In-memory inventory ledger for testing.
///
/// A single mutex stands in for row locks: a batch holds it from the first
/// stock read until every row is written, so concurrent batches serialize
/// the same way they do against PostgreSQL.
#[derive(Clone, Default)]
pub struct InMemoryInventoryLedger {
    products: Arc<Mutex<HashMap<ProductId, Product>>>,
    fail_on_decrement: Arc<AtomicBool>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryInventoryLedger {
    /// Creates a new empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored products.
    pub async fn product_count(&self) -> usize {
        self.products.lock().await.len()
    }

    /// Inserts a product with a caller-chosen id, replacing any existing row.
    pub async fn insert(&self, product: Product) {
        self.products
            .lock()
            .await
            .insert(product.id.clone(), product);
    }

    /// Current stock of a product, if it exists.
    pub async fn stock_of(&self, id: &ProductId) -> Option<i32> {
        self.products.lock().await.get(id).map(|p| p.stock_quantity)
    }

    /// Configures decrements to fail with a storage error.
    pub fn set_fail_on_decrement(&self, fail: bool) {
        self.fail_on_decrement.store(fail, Ordering::SeqCst);
    }

    /// Makes every operation fail as if the database were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(InventoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryLedger for InMemoryInventoryLedger {
    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        product.validate()?;
        self.check_available()?;

        let product = product.into_product(ProductId::new(uuid::Uuid::new_v4().to_string()));
        self.products
            .lock()
            .await
            .insert(product.id.clone(), product.clone());
        Ok(product)
    }

    async fn read_by_id(&self, id: &ProductId) -> Result<Product> {
        self.check_available()?;
        self.products
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| InventoryError::NotFound(id.clone()))
    }

    async fn decrement_for_order(&self, items: &[StockDecrement]) -> Result<Vec<ProductId>> {
        validate_decrements(items)?;
        self.check_available()?;
        if self.fail_on_decrement.load(Ordering::SeqCst) {
            return Err(InventoryError::Database(sqlx::Error::PoolTimedOut));
        }

        let mut products = self.products.lock().await;

        let on_hand: HashMap<ProductId, i32> = items
            .iter()
            .filter_map(|item| {
                products
                    .get(&item.product_id)
                    .map(|p| (p.id.clone(), p.stock_quantity))
            })
            .collect();

        let updates = plan_decrements(items, &on_hand)?;

        let mut touched = Vec::with_capacity(updates.len());
        for update in updates {
            if let Some(product) = products.get_mut(&update.product_id) {
                product.stock_quantity = update.stock_quantity;
            }
            touched.push(update.product_id);
        }

        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ledger_with(entries: &[(&str, i32)]) -> InMemoryInventoryLedger {
        let ledger = InMemoryInventoryLedger::new();
        for (id, stock) in entries {
            ledger
                .insert(NewProduct::new(*id, "", 1.0, *stock).into_product(ProductId::new(*id)))
                .await;
        }
        ledger
    }

    #[tokio::test]
    async fn create_assigns_id() {
        let ledger = InMemoryInventoryLedger::new();
        let product = ledger
            .create_product(NewProduct::new("Widget", "...", 9.99, 100))
            .await
            .unwrap();

        assert!(!product.id.as_str().is_empty());
        assert_eq!(product.stock_quantity, 100);
        assert_eq!(ledger.read_by_id(&product.id).await.unwrap(), product);
    }

    #[tokio::test]
    async fn read_missing_is_not_found() {
        let ledger = InMemoryInventoryLedger::new();
        let err = ledger.read_by_id(&ProductId::new("nope")).await.unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn decrement_success_returns_touched_ids() {
        let ledger = ledger_with(&[("p1", 100), ("p2", 3)]).await;

        let touched = ledger
            .decrement_for_order(&[StockDecrement::new("p2", 3), StockDecrement::new("p1", 10)])
            .await
            .unwrap();

        assert_eq!(touched, vec![ProductId::new("p2"), ProductId::new("p1")]);
        assert_eq!(ledger.stock_of(&ProductId::new("p1")).await, Some(90));
        assert_eq!(ledger.stock_of(&ProductId::new("p2")).await, Some(0));
    }

    #[tokio::test]
    async fn failing_line_leaves_every_row_unchanged() {
        let ledger = ledger_with(&[("p1", 100), ("p2", 3)]).await;

        let err = ledger
            .decrement_for_order(&[StockDecrement::new("p1", 10), StockDecrement::new("p2", 4)])
            .await
            .unwrap_err();

        assert!(matches!(err, InventoryError::InsufficientStock { .. }));
        assert_eq!(ledger.stock_of(&ProductId::new("p1")).await, Some(100));
        assert_eq!(ledger.stock_of(&ProductId::new("p2")).await, Some(3));
    }

    #[tokio::test]
    async fn concurrent_batches_never_oversell() {
        let ledger = ledger_with(&[("p1", 10)]).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .decrement_for_order(&[StockDecrement::new("p1", 3)])
                    .await
                    .is_ok()
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 3);
        assert_eq!(ledger.stock_of(&ProductId::new("p1")).await, Some(1));
    }

    #[tokio::test]
    async fn decrement_failure_toggle_leaves_stock_untouched() {
        let ledger = InMemoryInventoryLedger::new();
        let product = ledger
            .create_product(NewProduct::new("Widget", "", 1.0, 10))
            .await
            .unwrap();
        ledger.set_fail_on_decrement(true);

        let err = ledger
            .decrement_for_order(&[StockDecrement::new(product.id.clone(), 1)])
            .await
            .unwrap_err();

        assert!(err.is_storage());
        assert_eq!(ledger.stock_of(&product.id).await, Some(10));

        ledger.set_fail_on_decrement(false);
        ledger
            .decrement_for_order(&[StockDecrement::new(product.id.clone(), 1)])
            .await
            .unwrap();
        assert_eq!(ledger.stock_of(&product.id).await, Some(9));
    }

    #[tokio::test]
    async fn unavailable_ledger_fails_reads() {
        let ledger = InMemoryInventoryLedger::new();
        let product = ledger
            .create_product(NewProduct::new("Widget", "", 1.0, 10))
            .await
            .unwrap();
        ledger.set_unavailable(true);

        let err = ledger.read_by_id(&product.id).await.unwrap_err();
        assert!(matches!(err, InventoryError::Database(_)));
    }
}
