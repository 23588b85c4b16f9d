use resto_core::broker::{Broker, STATUS_EXCHANGE};
use resto_core::messages::StatusMessage;

/// Publishes status-changed events onto the fanout exchange. Routing key is
/// irrelevant for fanout; every bound subscriber gets every event.
pub struct StatusPublisher<'a> {
    broker: &'a Broker,
}

impl<'a> StatusPublisher<'a> {
    pub fn new(broker: &'a Broker) -> Self {
        Self { broker }
    }

    pub async fn status_changed(&self, message: &StatusMessage) -> Result<(), lapin::Error> {
        let body = serde_json::to_vec(message).expect("serialize status message");
        self.broker.publish(STATUS_EXCHANGE, "", body, None).await
    }
}
