use chrono::Utc;
use diesel::PgConnection;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use resto_core::broker::{Broker, DEAD_LETTER_EXCHANGE, DEAD_LETTER_KEY, ORDER_EXCHANGE};
use resto_core::error::Error;
use resto_core::messages::{OrderMessage, StatusMessage};
use resto_core::models::OrderStatus;

use crate::capabilities::Capabilities;
use crate::cook_time::CookTimeEstimator;
use crate::events::StatusPublisher;
use crate::processor::{self, StartCooking};
use crate::registry;

/// Declares this worker's durable queue, binds it per the capability set,
/// and bounds the unacked window with prefetch. Dead-letter arguments catch
/// rejected (capability-mismatched or undecodable) messages.
pub async fn declare_queue(
    broker: &Broker,
    worker_name: &str,
    capabilities: &Capabilities,
    prefetch: u16,
) -> Result<String, lapin::Error> {
    let channel = broker.channel();

    let mut args = FieldTable::default();
    args.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString(DEAD_LETTER_EXCHANGE.to_string().into()),
    );
    args.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(DEAD_LETTER_KEY.to_string().into()),
    );
    args.insert("x-max-priority".into(), AMQPValue::ShortShortUInt(10));

    let queue_name = format!("orders_queue_{}", worker_name);
    channel
        .queue_declare(
            &queue_name,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            args,
        )
        .await?;

    for key in capabilities.binding_keys() {
        channel
            .queue_bind(
                &queue_name,
                ORDER_EXCHANGE,
                &key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
    }

    channel.basic_qos(prefetch, BasicQosOptions::default()).await?;
    Ok(queue_name)
}

enum Processed {
    Done,
    AlreadyProcessed,
    /// Shutdown fired during the cook wait. The message stays unacked so the
    /// broker redelivers it to another worker; it is not force-nacked.
    Abandoned,
}

/// Why the consume loop returned. A stream that ends without a shutdown
/// request means the broker connection dropped; the worker must reconnect
/// and resubscribe, never linger heartbeating `online` while consuming
/// nothing.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Exit {
    Shutdown,
    StreamEnded,
}

impl Exit {
    pub fn should_resubscribe(&self, shutdown_requested: bool) -> bool {
        matches!(self, Exit::StreamEnded) && !shutdown_requested
    }
}

/// One consumption loop, one message at a time. Shutdown is observed only
/// between deliveries and inside the cook wait, so a transition that has
/// started always runs to its commit.
pub async fn run(
    broker: &Broker,
    conn: &mut PgConnection,
    queue_name: &str,
    worker_name: &str,
    capabilities: &Capabilities,
    estimator: &dyn CookTimeEstimator,
    shutdown: CancellationToken,
) -> Result<Exit, lapin::Error> {
    let mut consumer = broker
        .channel()
        .basic_consume(
            queue_name,
            worker_name,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;
    info!(worker = worker_name, queue = queue_name, "worker consuming");

    let exit = loop {
        let delivery = tokio::select! {
            _ = shutdown.cancelled() => break Exit::Shutdown,
            next = consumer.next() => match next {
                Some(Ok(delivery)) => delivery,
                Some(Err(err)) => {
                    error!(error = %err, "failed to receive delivery");
                    continue;
                }
                None => {
                    warn!(worker = worker_name, "delivery stream ended");
                    break Exit::StreamEnded;
                }
            },
        };

        handle_delivery(
            conn,
            broker,
            worker_name,
            capabilities,
            estimator,
            &shutdown,
            delivery,
        )
        .await;
    };

    info!(worker = worker_name, "worker stopped consuming");
    Ok(exit)
}

async fn handle_delivery(
    conn: &mut PgConnection,
    broker: &Broker,
    worker_name: &str,
    capabilities: &Capabilities,
    estimator: &dyn CookTimeEstimator,
    shutdown: &CancellationToken,
    delivery: Delivery,
) {
    let message: OrderMessage = match serde_json::from_slice(&delivery.data) {
        Ok(message) => message,
        Err(err) => {
            error!(error = %err, "undecodable order message, dead-lettering");
            nack(&delivery, false).await;
            return;
        }
    };

    if !capabilities.accepts(message.order_type) {
        // A mismatch reaching this consumer means the queue binding is
        // misconfigured, not a transient failure. No DB writes happen.
        warn!(
            order_number = %message.order_number,
            order_type = %message.order_type,
            "order type outside capability set, rejecting without requeue"
        );
        nack(&delivery, false).await;
        return;
    }

    match process_order(conn, broker, worker_name, estimator, shutdown, &message).await {
        Ok(Processed::Done) => {
            info!(order_number = %message.order_number, "order processed");
            ack(&delivery).await;
        }
        Ok(Processed::AlreadyProcessed) => {
            info!(
                order_number = %message.order_number,
                "order already processed, acknowledging redelivery"
            );
            ack(&delivery).await;
        }
        Ok(Processed::Abandoned) => {
            info!(
                order_number = %message.order_number,
                "shutdown during cook wait, leaving message unacknowledged"
            );
        }
        Err(err) => {
            warn!(
                order_number = %message.order_number,
                error = %err,
                "order processing failed, requeueing"
            );
            nack(&delivery, true).await;
        }
    }
}

/// Drives one order through `cooking` and `ready`. Every fallible step
/// before the ready commit propagates its error so the caller requeues;
/// after the ready commit only logging remains between us and the ack.
async fn process_order(
    conn: &mut PgConnection,
    broker: &Broker,
    worker_name: &str,
    estimator: &dyn CookTimeEstimator,
    shutdown: &CancellationToken,
    message: &OrderMessage,
) -> Result<Processed, Error> {
    let publisher = StatusPublisher::new(broker);

    match processor::start_cooking(conn, &message.order_number, worker_name)? {
        StartCooking::AlreadyProcessed => return Ok(Processed::AlreadyProcessed),
        StartCooking::Started | StartCooking::Resumed => {}
    }

    let cook_time = estimator.estimate(message.order_type);
    publisher
        .status_changed(&StatusMessage {
            order_number: message.order_number.clone(),
            old_status: OrderStatus::Received,
            new_status: OrderStatus::Cooking,
            changed_by: worker_name.to_string(),
            timestamp: Utc::now(),
            estimated_completion: Some(
                Utc::now() + chrono::Duration::seconds(cook_time.as_secs() as i64),
            ),
        })
        .await?;

    tokio::select! {
        _ = shutdown.cancelled() => return Ok(Processed::Abandoned),
        _ = tokio::time::sleep(cook_time) => {}
    }

    processor::complete_order(conn, &message.order_number, worker_name)?;
    registry::increment_processed(conn, worker_name);

    if let Err(err) = publisher
        .status_changed(&StatusMessage {
            order_number: message.order_number.clone(),
            old_status: OrderStatus::Cooking,
            new_status: OrderStatus::Ready,
            changed_by: worker_name.to_string(),
            timestamp: Utc::now(),
            estimated_completion: None,
        })
        .await
    {
        // The order is durably ready; a lost ready event must not hold the
        // message hostage.
        warn!(
            order_number = %message.order_number,
            error = %err,
            "ready event not published"
        );
    }

    Ok(Processed::Done)
}

async fn ack(delivery: &Delivery) {
    if let Err(err) = delivery.ack(BasicAckOptions::default()).await {
        error!(error = %err, "failed to ack delivery");
    }
}

async fn nack(delivery: &Delivery, requeue: bool) {
    let options = BasicNackOptions {
        requeue,
        ..Default::default()
    };
    if let Err(err) = delivery.nack(options).await {
        error!(error = %err, "failed to nack delivery");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_stream_triggers_resubscribe() {
        assert!(Exit::StreamEnded.should_resubscribe(false));
    }

    #[test]
    fn stream_end_during_shutdown_exits_cleanly() {
        assert!(!Exit::StreamEnded.should_resubscribe(true));
    }

    #[test]
    fn requested_shutdown_never_resubscribes() {
        assert!(!Exit::Shutdown.should_resubscribe(false));
        assert!(!Exit::Shutdown.should_resubscribe(true));
    }
}
