//! RabbitMQ (AMQP 0-9-1) adapter for the broker seams.

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};

use crate::broker::{InboundMessage, MessageStream, ResultPublisher};
use crate::error::{Result, SagaError};
use crate::events::StockUpdateResult;
use crate::propagation::MessageHeaders;
use crate::topology::{
    CONTENT_TYPE_JSON, ORDER_CREATED_QUEUE, ORDERS_EXCHANGE, STOCK_UPDATE_EXCHANGE,
};

/// One AMQP connection with a single channel.
pub struct AmqpBroker {
    connection: Connection,
    channel: Channel,
}

impl AmqpBroker {
    /// Connects to the broker and opens a channel.
    pub async fn connect(uri: &str) -> Result<Self> {
        let properties = ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio);

        let connection = Connection::connect(uri, properties).await?;
        let channel = connection.create_channel().await?;

        Ok(Self {
            connection,
            channel,
        })
    }

    /// Declares the durable fanout exchange results are published to.
    pub async fn declare_result_exchange(&self) -> Result<()> {
        declare_fanout(&self.channel, STOCK_UPDATE_EXCHANGE).await
    }

    /// Declares the inbound topology and starts consuming it.
    ///
    /// Deliveries are acknowledged by the broker as they are handed out
    /// (`no_ack`); nothing is redelivered if processing fails afterwards.
    pub async fn subscribe_order_created(&self) -> Result<MessageStream> {
        declare_fanout(&self.channel, ORDERS_EXCHANGE).await?;

        let queue = self
            .channel
            .queue_declare(
                ORDER_CREATED_QUEUE,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;

        self.channel
            .queue_bind(
                queue.name().as_str(),
                ORDERS_EXCHANGE,
                "",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let consumer = self
            .channel
            .basic_consume(
                queue.name().as_str(),
                "",
                BasicConsumeOptions {
                    no_ack: true,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await?;

        tracing::info!(queue = ORDER_CREATED_QUEUE, "listening for OrderCreated events");

        let stream = consumer.map(|delivery| match delivery {
            Ok(delivery) => Ok(InboundMessage::new(
                delivery.data,
                headers_from_table(delivery.properties.headers().as_ref()),
            )),
            Err(e) => Err(SagaError::Broker(e)),
        });

        Ok(Box::pin(stream))
    }

    /// A publisher sharing this broker's channel.
    pub fn publisher(&self) -> AmqpResultPublisher {
        AmqpResultPublisher {
            channel: self.channel.clone(),
        }
    }

    /// Closes the channel, then the connection.
    pub async fn close(&self) -> Result<()> {
        self.channel.close(200, "shutting down").await?;
        self.connection.close(200, "shutting down").await?;
        Ok(())
    }
}

async fn declare_fanout(channel: &Channel, exchange: &str) -> Result<()> {
    channel
        .exchange_declare(
            exchange,
            ExchangeKind::Fanout,
            ExchangeDeclareOptions {
                durable: true,
                ..ExchangeDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await?;
    Ok(())
}

/// Publishes results to [`STOCK_UPDATE_EXCHANGE`].
#[derive(Clone)]
pub struct AmqpResultPublisher {
    channel: Channel,
}

#[async_trait]
impl ResultPublisher for AmqpResultPublisher {
    async fn publish(&self, result: &StockUpdateResult, headers: MessageHeaders) -> Result<()> {
        let body = serde_json::to_vec(result)?;

        let properties = BasicProperties::default()
            .with_content_type(ShortString::from(CONTENT_TYPE_JSON))
            .with_headers(table_from_headers(&headers));

        self.channel
            .basic_publish(
                STOCK_UPDATE_EXCHANGE,
                "",
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await
            .map_err(|e| SagaError::Publish(e.to_string()))?
            .await
            .map_err(|e| SagaError::Publish(e.to_string()))?;

        Ok(())
    }
}

/// Copies string-valued AMQP headers; other value types are skipped.
pub fn headers_from_table(table: Option<&FieldTable>) -> MessageHeaders {
    let Some(table) = table else {
        return MessageHeaders::new();
    };

    table
        .inner()
        .iter()
        .filter_map(|(key, value)| {
            let value = match value {
                AMQPValue::LongString(s) => String::from_utf8_lossy(s.as_bytes()).into_owned(),
                AMQPValue::ShortString(s) => s.as_str().to_string(),
                _ => return None,
            };
            Some((key.as_str().to_string(), value))
        })
        .collect()
}

/// Converts headers to an AMQP table of long strings.
pub fn table_from_headers(headers: &MessageHeaders) -> FieldTable {
    let mut table = FieldTable::default();
    for (key, value) in headers.iter() {
        table.insert(
            ShortString::from(key.to_string()),
            AMQPValue::LongString(LongString::from(value.to_string())),
        );
    }
    table
}
