//! Product service: catalog HTTP API and process wiring.
//!
//! Serves product reads (cache-aside) and creation over HTTP, with structured
//! logging (tracing + OpenTelemetry) and Prometheus metrics. The binary also
//! runs the stock reconciliation consumer from the `saga` crate.

pub mod config;
pub mod error;
pub mod retry;
pub mod routes;
pub mod telemetry;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use inventory::{CacheStore, InventoryLedger};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::products::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<L, C>(state: Arc<AppState<L, C>>, metrics_handle: PrometheusHandle) -> Router
where
    L: InventoryLedger + 'static,
    C: CacheStore + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/products", post(routes::products::create::<L, C>))
        .route("/products/{id}", get(routes::products::get::<L, C>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
