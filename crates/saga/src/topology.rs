//! Broker topology shared by every product service instance.

/// Fanout exchange the order service publishes `OrderCreated` to.
pub const ORDERS_EXCHANGE: &str = "orders_exchange";

/// Durable queue bound to [`ORDERS_EXCHANGE`], consumed competitively.
pub const ORDER_CREATED_QUEUE: &str = "product_service_order_created_queue";

/// Fanout exchange stock update results are published to.
pub const STOCK_UPDATE_EXCHANGE: &str = "stock_update_exchange";

/// Value of the `messaging.system` span attribute.
pub const MESSAGING_SYSTEM: &str = "rabbitmq";

/// Content type of every message body.
pub const CONTENT_TYPE_JSON: &str = "application/json";
