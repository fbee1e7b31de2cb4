//! Catalog operations combining the ledger with the product cache.

use crate::cache::{CacheStore, ProductCache};
use crate::ledger::InventoryLedger;
use crate::{NewProduct, Product, ProductId, Result, StockDecrement};

/// Application service for products.
///
/// Reads go through the cache (cache-aside); decrements go to the ledger and
/// invalidate the touched snapshots once the transaction has committed.
#[derive(Clone)]
pub struct ProductService<L, C> {
    ledger: L,
    cache: ProductCache<C>,
}

impl<L, C> ProductService<L, C>
where
    L: InventoryLedger,
    C: CacheStore,
{
    pub fn new(ledger: L, cache: ProductCache<C>) -> Self {
        Self { ledger, cache }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn cache(&self) -> &ProductCache<C> {
        &self.cache
    }

    /// Stores a new product. The cache is not touched.
    #[tracing::instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let product = self.ledger.create_product(product).await?;
        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    /// Cache-aside read: cache first, storage on miss, then repopulate.
    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, id: &ProductId) -> Result<Product> {
        if let Some(product) = self.cache.get(id).await {
            metrics::counter!("product_cache_hits_total").increment(1);
            return Ok(product);
        }
        metrics::counter!("product_cache_misses_total").increment(1);

        let product = self.ledger.read_by_id(id).await?;
        self.cache.put(&product).await;
        Ok(product)
    }

    /// Decrements stock for one order and invalidates what it touched.
    ///
    /// Invalidation happens only after a successful commit; a failed batch
    /// changed nothing, so its cached snapshots stay valid.
    #[tracing::instrument(skip(self, items), fields(lines = items.len()))]
    pub async fn decrement_for_order(&self, items: &[StockDecrement]) -> Result<Vec<ProductId>> {
        let touched = self.ledger.decrement_for_order(items).await?;
        self.cache.invalidate(&touched).await;
        Ok(touched)
    }
}
