use std::env;

use chrono::Utc;
use lapin::{
    options::{BasicPublishOptions, ExchangeDeclareOptions},
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
};
use tracing::info;

/// Topic exchange carrying order-created events, keyed `kitchen.<type>.<priority>`.
pub const ORDER_EXCHANGE: &str = "orders.topic";
/// Fanout exchange carrying status-changed events to every subscriber.
pub const STATUS_EXCHANGE: &str = "orders.status";
/// Dead-letter target for worker queues. Declared, not consumed here.
pub const DEAD_LETTER_EXCHANGE: &str = "orders.dlx";
pub const DEAD_LETTER_KEY: &str = "orders.dead";

/// Owned broker handle, one per process. Publishers and consumers borrow the
/// channel; reconnection goes through [`Broker::ensure_connected`] so there is
/// a single owner for the connection state instead of ambient globals.
pub struct Broker {
    uri: String,
    connection: Connection,
    channel: Channel,
}

impl Broker {
    pub async fn connect() -> Result<Self, lapin::Error> {
        let uri = env::var("AMQP_URL").expect("AMQP_URL must be set");
        Self::connect_uri(uri).await
    }

    pub async fn connect_uri(uri: String) -> Result<Self, lapin::Error> {
        let (connection, channel) = Self::open(&uri).await?;
        let broker = Broker {
            uri,
            connection,
            channel,
        };
        broker.declare_topology().await?;
        Ok(broker)
    }

    async fn open(uri: &str) -> Result<(Connection, Channel), lapin::Error> {
        let connection = Connection::connect(uri, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        Ok((connection, channel))
    }

    /// Durable exchanges survive broker restarts; declaration is idempotent
    /// so every process declares on startup.
    async fn declare_topology(&self) -> Result<(), lapin::Error> {
        self.channel
            .exchange_declare(
                ORDER_EXCHANGE,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        self.channel
            .exchange_declare(
                STATUS_EXCHANGE,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        self.channel
            .exchange_declare(
                DEAD_LETTER_EXCHANGE,
                ExchangeKind::Direct,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(())
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Reconnect on demand, guarded by a health check on the current
    /// connection. Topology is re-declared after a reconnect.
    pub async fn ensure_connected(&mut self) -> Result<(), lapin::Error> {
        if self.connection.status().connected() && self.channel.status().connected() {
            return Ok(());
        }

        info!("broker connection lost, reconnecting");
        let (connection, channel) = Self::open(&self.uri).await?;
        self.connection = connection;
        self.channel = channel;
        self.declare_topology().await
    }

    /// Persistent-delivery publish. `priority` is set for order-created
    /// events so priority queues offer expensive orders first.
    pub async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: Vec<u8>,
        priority: Option<u8>,
    ) -> Result<(), lapin::Error> {
        let mut properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2)
            .with_timestamp(Utc::now().timestamp() as u64);
        if let Some(priority) = priority {
            properties = properties.with_priority(priority);
        }

        self.channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await?
            .await?;
        Ok(())
    }

    pub async fn close(self) {
        let _ = self.channel.close(200, "bye").await;
        let _ = self.connection.close(200, "bye").await;
    }
}
