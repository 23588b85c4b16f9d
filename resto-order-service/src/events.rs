use resto_core::broker::{Broker, ORDER_EXCHANGE};
use resto_core::messages::OrderMessage;

/// Publishes order-created events onto the topic exchange. Never retries;
/// the caller decides what a failed publish means.
pub struct OrderEventPublisher<'a> {
    broker: &'a Broker,
}

impl<'a> OrderEventPublisher<'a> {
    pub fn new(broker: &'a Broker) -> Self {
        Self { broker }
    }

    pub async fn order_created(&self, message: &OrderMessage) -> Result<(), lapin::Error> {
        let body = serde_json::to_vec(message).expect("serialize order message");
        self.broker
            .publish(
                ORDER_EXCHANGE,
                &message.routing_key(),
                body,
                Some(message.priority.clamp(0, 255) as u8),
            )
            .await
    }
}
