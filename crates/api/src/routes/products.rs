//! Product catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use inventory::{CacheStore, InventoryLedger, NewProduct, Product, ProductId, ProductService};
use serde::Deserialize;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<L, C> {
    pub products: ProductService<L, C>,
}

impl<L, C> AppState<L, C> {
    pub fn new(products: ProductService<L, C>) -> Self {
        Self { products }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub stock_quantity: i32,
}

impl From<CreateProductRequest> for NewProduct {
    fn from(req: CreateProductRequest) -> Self {
        NewProduct::new(req.name, req.description, req.price, req.stock_quantity)
    }
}

/// POST /products — store a new product.
#[tracing::instrument(skip(state, req), fields(name = %req.name))]
pub async fn create<L, C>(
    State(state): State<Arc<AppState<L, C>>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError>
where
    L: InventoryLedger + 'static,
    C: CacheStore + 'static,
{
    let product = state.products.create_product(req.into()).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /products/{id} — read a product through the cache.
///
/// Any failure, storage faults included, is reported as not found.
#[tracing::instrument(skip(state))]
pub async fn get<L, C>(
    State(state): State<Arc<AppState<L, C>>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError>
where
    L: InventoryLedger + 'static,
    C: CacheStore + 'static,
{
    let id = ProductId::new(id);
    match state.products.get_product(&id).await {
        Ok(product) => Ok(Json(product)),
        Err(e) => {
            if e.is_storage() {
                tracing::error!(product_id = %id, error = %e, "product lookup failed");
            }
            Err(ApiError::NotFound(format!("Product {id} not found")))
        }
    }
}
