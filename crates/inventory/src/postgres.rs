use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    InventoryError, NewProduct, Product, ProductId, Result, StockDecrement,
    ledger::{InventoryLedger, lock_order, plan_decrements, validate_decrements},
};

/// PostgreSQL-backed inventory ledger.
#[derive(Clone)]
pub struct PostgresInventoryLedger {
    pool: PgPool,
}

impl PostgresInventoryLedger {
    /// Creates a new ledger over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: row.try_get("price")?,
            stock_quantity: row.try_get("stock_quantity")?,
        })
    }
}

#[async_trait]
impl InventoryLedger for PostgresInventoryLedger {
    #[tracing::instrument(skip(self, product), fields(name = %product.name))]
    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        product.validate()?;

        let id: String = sqlx::query_scalar(
            r#"
            INSERT INTO products (name, description, price, stock_quantity)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock_quantity)
        .fetch_one(&self.pool)
        .await?;

        Ok(product.into_product(ProductId::new(id)))
    }

    async fn read_by_id(&self, id: &ProductId) -> Result<Product> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, name, description, price, stock_quantity
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_product(row),
            None => Err(InventoryError::NotFound(id.clone())),
        }
    }

    #[tracing::instrument(skip(self, items), fields(lines = items.len()))]
    async fn decrement_for_order(&self, items: &[StockDecrement]) -> Result<Vec<ProductId>> {
        validate_decrements(items)?;
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = lock_order(items).into_iter().map(String::from).collect();

        // Dropping the transaction without commit rolls it back, so every
        // early return below leaves the rows untouched.
        let mut tx = self.pool.begin().await?;

        // Lock every row of the batch in one statement, in id order.
        let rows = sqlx::query(
            r#"
            SELECT id, stock_quantity
            FROM products
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        let mut on_hand = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let stock: i32 = row.try_get("stock_quantity")?;
            on_hand.insert(ProductId::new(id), stock);
        }

        let updates = plan_decrements(items, &on_hand)?;

        for update in &updates {
            sqlx::query("UPDATE products SET stock_quantity = $1 WHERE id = $2")
                .bind(update.stock_quantity)
                .bind(update.product_id.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(updates.into_iter().map(|u| u.product_id).collect())
    }
}
