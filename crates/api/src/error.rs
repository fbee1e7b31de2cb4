//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inventory::{CacheError, InventoryError};
use saga::SagaError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Catalog or ledger error.
    Inventory(InventoryError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Inventory(err) => inventory_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn inventory_error_to_response(err: InventoryError) -> (StatusCode, String) {
    match &err {
        InventoryError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        InventoryError::InvalidProduct(_) | InventoryError::InvalidQuantity { .. } => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        _ => {
            tracing::error!(error = %err, "catalog operation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        ApiError::Inventory(err)
    }
}

/// Failures that abort process startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Telemetry setup failed: {0}")]
    Telemetry(String),

    #[error("Metrics recorder setup failed: {0}")]
    Metrics(String),

    #[error("Database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache connection failed: {0}")]
    Cache(#[from] CacheError),

    #[error("Inventory setup failed: {0}")]
    Inventory(#[from] InventoryError),

    #[error("Broker setup failed: {0}")]
    Broker(#[from] SagaError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
