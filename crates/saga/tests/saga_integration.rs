//! End-to-end tests of the stock reconciliation consumer over in-memory
//! broker, ledger and cache.

use std::sync::Arc;
use std::time::Duration;

use inventory::{
    InMemoryCacheStore, InMemoryInventoryLedger, InventoryLedger, NewProduct, ProductCache,
    ProductId, ProductService,
};
use opentelemetry::Context;
use opentelemetry::trace::{
    SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState, TracerProvider as _,
};
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use saga::{
    ConsumerHandle, InMemoryQueue, InMemoryResultPublisher, InboundMessage, MessageHeaders,
    StockReconciliationHandler, StockUpdateResult, extract_context, init_propagator,
    inject_context,
};

type TestHandler = StockReconciliationHandler<
    InMemoryInventoryLedger,
    InMemoryCacheStore,
    InMemoryResultPublisher,
    SdkTracer,
>;

struct TestHarness {
    queue: InMemoryQueue,
    consumer: ConsumerHandle,
    handler: Arc<TestHandler>,
    ledger: InMemoryInventoryLedger,
    cache: InMemoryCacheStore,
    publisher: InMemoryResultPublisher,
}

impl TestHarness {
    fn new() -> Self {
        let ledger = InMemoryInventoryLedger::new();
        let cache = InMemoryCacheStore::new();
        let publisher = InMemoryResultPublisher::new();
        let products = ProductService::new(ledger.clone(), ProductCache::new(cache.clone()));
        init_propagator();
        let tracer = SdkTracerProvider::builder().build().tracer("saga-integration");
        let handler = Arc::new(StockReconciliationHandler::new(
            products,
            publisher.clone(),
            tracer,
        ));

        let (queue, stream) = InMemoryQueue::channel();
        let consumer = saga::start(stream, handler.clone());

        Self {
            queue,
            consumer,
            handler,
            ledger,
            cache,
            publisher,
        }
    }

    async fn product(&self, stock: i32) -> ProductId {
        self.ledger
            .create_product(NewProduct::new("Widget", "A widget", 9.99, stock))
            .await
            .unwrap()
            .id
    }

    fn send(&self, order_id: &str, lines: &[(&ProductId, i32)], headers: MessageHeaders) {
        let items: Vec<_> = lines
            .iter()
            .map(|(id, qty)| serde_json::json!({"product_id": id.as_str(), "quantity": qty}))
            .collect();
        let body = serde_json::json!({
            "order_id": order_id,
            "user_id": "user-1",
            "total_price": 42.0,
            "items": items,
        });
        assert!(
            self.queue
                .push(InboundMessage::new(serde_json::to_vec(&body).unwrap(), headers))
        );
    }

    async fn wait_for_results(&self, count: usize) -> Vec<StockUpdateResult> {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.publisher.published_count() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("results were not published in time");

        self.publisher
            .published()
            .into_iter()
            .map(|(result, _)| result)
            .collect()
    }
}

#[tokio::test]
async fn test_each_order_gets_exactly_one_result() {
    let h = TestHarness::new();
    let widget = h.product(100).await;

    h.send("order-1", &[(&widget, 10)], MessageHeaders::new());
    h.send("order-2", &[(&widget, 1000)], MessageHeaders::new());
    h.send("order-3", &[(&widget, 90)], MessageHeaders::new());

    let results = h.wait_for_results(3).await;

    assert_eq!(results[0], StockUpdateResult::succeeded("order-1".into()));
    assert!(!results[1].success);
    assert!(results[1].reason.as_deref().unwrap().contains("insufficient stock"));
    assert_eq!(results[2], StockUpdateResult::succeeded("order-3".into()));
    assert_eq!(h.ledger.stock_of(&widget).await, Some(0));

    h.queue.push(InboundMessage::new("garbage", MessageHeaders::new()));
    drop(h.queue);
    tokio::time::timeout(Duration::from_secs(5), async {
        while !h.consumer.is_finished() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(h.consumer.stop().await.unwrap(), 4);
    assert_eq!(h.publisher.published_count(), 3);
}

#[tokio::test]
async fn test_decrement_invalidates_cached_snapshot() {
    let h = TestHarness::new();
    let widget = h.product(100).await;

    let products = h.handler.products();
    assert_eq!(products.get_product(&widget).await.unwrap().stock_quantity, 100);
    assert!(h.cache.contains(&widget.cache_key()));

    h.send("order-1", &[(&widget, 10)], MessageHeaders::new());
    h.wait_for_results(1).await;

    assert!(!h.cache.contains(&widget.cache_key()));
    assert_eq!(products.get_product(&widget).await.unwrap().stock_quantity, 90);

    h.consumer.stop().await.unwrap();
}

#[tokio::test]
async fn test_unknown_product_fails_whole_order() {
    let h = TestHarness::new();
    let widget = h.product(5).await;
    let missing = ProductId::new("no-such-product");

    h.send("order-1", &[(&widget, 1), (&missing, 1)], MessageHeaders::new());

    let results = h.wait_for_results(1).await;
    assert!(!results[0].success);
    assert_eq!(h.ledger.stock_of(&widget).await, Some(5));

    h.consumer.stop().await.unwrap();
}

#[tokio::test]
async fn test_result_continues_the_inbound_trace() {
    let h = TestHarness::new();
    let widget = h.product(10).await;

    let upstream = SpanContext::new(
        TraceId::from_bytes([0x11; 16]),
        SpanId::from_bytes([0x22; 8]),
        TraceFlags::SAMPLED,
        true,
        TraceState::default(),
    );
    let mut headers = MessageHeaders::new();
    inject_context(
        &Context::new().with_remote_span_context(upstream.clone()),
        &mut headers,
    );

    h.send("order-1", &[(&widget, 1)], headers);
    h.wait_for_results(1).await;

    let (_, outbound) = h.publisher.published().remove(0);
    let cx = extract_context(&outbound);
    assert_eq!(cx.span().span_context().trace_id(), upstream.trace_id());

    h.consumer.stop().await.unwrap();
}

#[tokio::test]
async fn test_publish_outage_does_not_stop_consumer() {
    let h = TestHarness::new();
    let widget = h.product(10).await;

    h.publisher.set_fail_on_publish(true);
    h.send("order-1", &[(&widget, 2)], MessageHeaders::new());

    tokio::time::timeout(Duration::from_secs(5), async {
        while h.ledger.stock_of(&widget).await != Some(8) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    h.publisher.set_fail_on_publish(false);
    h.send("order-2", &[(&widget, 3)], MessageHeaders::new());

    let order_2 = StockUpdateResult::succeeded("order-2".into());
    tokio::time::timeout(Duration::from_secs(5), async {
        while !h.publisher.published().iter().any(|(r, _)| *r == order_2) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(h.ledger.stock_of(&widget).await, Some(5));
    assert!(!h.consumer.is_finished());

    h.consumer.stop().await.unwrap();
}
