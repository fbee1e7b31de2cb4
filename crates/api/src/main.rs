//! Product service entry point.

use std::sync::Arc;

use api::config::Config;
use api::error::StartupError;
use api::retry::connect_with_retry;
use api::{AppState, telemetry};
use inventory::{PostgresInventoryLedger, ProductCache, ProductService, RedisCacheStore};
use saga::{AmqpBroker, StockReconciliationHandler};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    // 1. Configuration and telemetry
    let config = Config::from_env();
    let telemetry = telemetry::init(&config)?;

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| StartupError::Metrics(e.to_string()))?;

    // 3. Connect to PostgreSQL and apply migrations
    let pool = connect_with_retry(
        "postgres",
        config.connect_attempts,
        config.connect_delay,
        || PgPoolOptions::new().max_connections(10).connect(&config.database_url),
    )
    .await?;
    let ledger = PostgresInventoryLedger::new(pool);
    ledger.run_migrations().await?;

    // 4. Connect to the shared Redis cache
    let cache = connect_with_retry(
        "redis",
        config.connect_attempts,
        config.connect_delay,
        || RedisCacheStore::connect(&config.redis_url),
    )
    .await?;
    let products = ProductService::new(ledger, ProductCache::with_ttl(cache, config.cache_ttl));

    // 5. Connect to RabbitMQ and start consuming OrderCreated
    let broker = connect_with_retry(
        "rabbitmq",
        config.connect_attempts,
        config.connect_delay,
        || AmqpBroker::connect(&config.rabbitmq_url),
    )
    .await?;
    broker.declare_result_exchange().await?;
    let messages = broker.subscribe_order_created().await?;

    let handler = Arc::new(StockReconciliationHandler::new(
        products.clone(),
        broker.publisher(),
        telemetry.tracer(),
    ));
    let consumer = saga::start(messages, handler);

    // 6. Serve HTTP until a shutdown signal arrives
    let app = api::create_app(Arc::new(AppState::new(products)), metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting product service");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 7. Stop consuming, then release the broker
    match consumer.stop().await {
        Ok(handled) => tracing::info!(handled, "stock consumer stopped"),
        Err(e) => tracing::error!(error = %e, "stock consumer did not stop cleanly"),
    }
    if let Err(e) = broker.close().await {
        tracing::warn!(error = %e, "failed to close broker connection");
    }

    tracing::info!("product service shut down gracefully");
    drop(telemetry);
    Ok(())
}
