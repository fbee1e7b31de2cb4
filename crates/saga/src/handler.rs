//! Turns one `OrderCreated` delivery into one published `StockUpdateResult`.

use std::time::Instant;

use async_trait::async_trait;
use inventory::{CacheStore, InventoryLedger, ProductService};
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};

use crate::broker::{InboundMessage, ResultPublisher};
use crate::events::{OrderCreated, StockUpdateResult};
use crate::propagation::{MessageHeaders, extract_context, inject_context};
use crate::state::ProcessingStage;
use crate::topology::{
    MESSAGING_SYSTEM, ORDER_CREATED_QUEUE, ORDERS_EXCHANGE, STOCK_UPDATE_EXCHANGE,
};

/// What happened to a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The body could not be decoded. Nothing was changed or published.
    Dropped { reason: String },
    /// A result (positive or negative) reached the broker.
    Published(StockUpdateResult),
    /// The ledger ran but the result never reached the broker.
    PublishFailed {
        result: StockUpdateResult,
        error: String,
    },
}

impl HandleOutcome {
    /// The last stage the message reached.
    pub fn stage(&self) -> ProcessingStage {
        match self {
            HandleOutcome::Dropped { .. } => ProcessingStage::Received,
            HandleOutcome::Published(_) => ProcessingStage::Acknowledged,
            HandleOutcome::PublishFailed { .. } => ProcessingStage::ResultBuilt,
        }
    }

    pub fn result(&self) -> Option<&StockUpdateResult> {
        match self {
            HandleOutcome::Dropped { .. } => None,
            HandleOutcome::Published(result) => Some(result),
            HandleOutcome::PublishFailed { result, .. } => Some(result),
        }
    }
}

/// Processes one inbound delivery to completion.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, message: InboundMessage) -> HandleOutcome;
}

/// Applies order stock decrements and reports the outcome back to the saga.
pub struct StockReconciliationHandler<L, C, P, T> {
    products: ProductService<L, C>,
    publisher: P,
    tracer: T,
}

impl<L, C, P, T> StockReconciliationHandler<L, C, P, T>
where
    L: InventoryLedger,
    C: CacheStore,
    P: ResultPublisher,
    T: Tracer + Send + Sync,
    T::Span: Send + Sync + 'static,
{
    pub fn new(products: ProductService<L, C>, publisher: P, tracer: T) -> Self {
        Self {
            products,
            publisher,
            tracer,
        }
    }

    pub fn products(&self) -> &ProductService<L, C> {
        &self.products
    }

    /// Starts the consumer span before the body is decoded, so undecodable
    /// deliveries are still traced under the publisher's trace.
    fn consumer_context(&self, parent: &Context) -> Context {
        let span = self
            .tracer
            .span_builder(format!("{ORDERS_EXCHANGE} receive"))
            .with_kind(SpanKind::Consumer)
            .with_attributes(vec![
                KeyValue::new("messaging.system", MESSAGING_SYSTEM),
                KeyValue::new("messaging.destination.name", ORDERS_EXCHANGE),
                KeyValue::new("messaging.rabbitmq.queue", ORDER_CREATED_QUEUE),
                KeyValue::new("messaging.operation", "receive"),
            ])
            .start_with_context(&self.tracer, parent);
        parent.with_span(span)
    }

    fn producer_context(&self, parent: &Context, result: &StockUpdateResult) -> Context {
        let span = self
            .tracer
            .span_builder(format!("{STOCK_UPDATE_EXCHANGE} publish"))
            .with_kind(SpanKind::Producer)
            .with_attributes(vec![
                KeyValue::new("messaging.system", MESSAGING_SYSTEM),
                KeyValue::new("messaging.destination.name", STOCK_UPDATE_EXCHANGE),
                KeyValue::new("messaging.operation", "publish"),
                KeyValue::new("order.id", result.order_id.to_string()),
                KeyValue::new("stock.success", result.success),
            ])
            .start_with_context(&self.tracer, parent);
        parent.with_span(span)
    }

    async fn apply(&self, event: &OrderCreated, cx: &Context) -> StockUpdateResult {
        match self.products.decrement_for_order(&event.decrements()).await {
            Ok(touched) => {
                tracing::info!(
                    order_id = %event.order_id,
                    products = touched.len(),
                    "stock updated for order"
                );
                metrics::counter!("stock_updates_total", "outcome" => "success").increment(1);
                StockUpdateResult::succeeded(event.order_id.clone())
            }
            Err(e) => {
                if e.is_storage() {
                    tracing::error!(order_id = %event.order_id, error = %e, "stock update failed");
                } else {
                    tracing::warn!(order_id = %event.order_id, error = %e, "stock update rejected");
                }
                cx.span()
                    .set_attribute(KeyValue::new("stock.rejection", e.to_string()));
                metrics::counter!("stock_updates_total", "outcome" => "failure").increment(1);
                StockUpdateResult::failed(event.order_id.clone(), e.to_string())
            }
        }
    }

    async fn publish(&self, result: StockUpdateResult, parent: &Context) -> HandleOutcome {
        let cx = self.producer_context(parent, &result);

        let mut headers = MessageHeaders::new();
        inject_context(&cx, &mut headers);

        let published = self.publisher.publish(&result, headers).await;
        let span = cx.span();
        let outcome = match published {
            Ok(()) => {
                metrics::counter!("stock_results_published_total").increment(1);
                tracing::debug!(
                    order_id = %result.order_id,
                    success = result.success,
                    "stock update result published"
                );
                HandleOutcome::Published(result)
            }
            Err(e) => {
                span.record_error(&e);
                span.set_status(Status::error(e.to_string()));
                metrics::counter!("stock_results_publish_failed_total").increment(1);
                tracing::error!(
                    order_id = %result.order_id,
                    success = result.success,
                    error = %e,
                    "CRITICAL: failed to publish stock update result, saga left unresolved"
                );
                HandleOutcome::PublishFailed {
                    result,
                    error: e.to_string(),
                }
            }
        };
        span.end();
        outcome
    }
}

#[async_trait]
impl<L, C, P, T> MessageHandler for StockReconciliationHandler<L, C, P, T>
where
    L: InventoryLedger + 'static,
    C: CacheStore + 'static,
    P: ResultPublisher + 'static,
    T: Tracer + Send + Sync + 'static,
    T::Span: Send + Sync + 'static,
{
    async fn handle(&self, message: InboundMessage) -> HandleOutcome {
        metrics::counter!("stock_events_received_total").increment(1);
        let started = Instant::now();

        let parent = extract_context(&message.headers);
        let cx = self.consumer_context(&parent);

        let event: OrderCreated = match serde_json::from_slice(&message.body) {
            Ok(event) => event,
            Err(e) => {
                let span = cx.span();
                span.record_error(&e);
                span.set_status(Status::error(e.to_string()));
                span.end();
                tracing::warn!(
                    error = %e,
                    bytes = message.body.len(),
                    "dropping undecodable OrderCreated message"
                );
                metrics::counter!("stock_events_dropped_total").increment(1);
                return HandleOutcome::Dropped {
                    reason: e.to_string(),
                };
            }
        };
        cx.span()
            .set_attribute(KeyValue::new("order.id", event.order_id.to_string()));
        cx.span()
            .set_attribute(KeyValue::new("order.lines", event.items.len() as i64));

        let result = self.apply(&event, &cx).await;
        let outcome = self.publish(result, &cx).await;

        let span = cx.span();
        if matches!(outcome, HandleOutcome::PublishFailed { .. }) {
            span.set_status(Status::error("result not published"));
        }
        span.end();

        metrics::histogram!("stock_update_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        outcome
    }
}
