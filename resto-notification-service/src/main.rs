use std::time::Duration;

use dotenvy::dotenv;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::Consumer;
use tracing::{error, info, warn};

use resto_core::broker::{Broker, STATUS_EXCHANGE};
use resto_core::messages::StatusMessage;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Binds a fresh exclusive queue to the status fanout exchange. Queues are
/// broker-named and auto-deleted, so every subscriber instance sees every
/// event and leaves nothing behind.
async fn subscribe(broker: &Broker) -> Result<Consumer, lapin::Error> {
    let channel = broker.channel();

    let queue = channel
        .queue_declare(
            "",
            QueueDeclareOptions {
                exclusive: true,
                auto_delete: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;
    channel
        .queue_bind(
            queue.name().as_str(),
            STATUS_EXCHANGE,
            "",
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    let consumer = channel
        .basic_consume(
            queue.name().as_str(),
            "notification-subscriber",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;
    info!(queue = queue.name().as_str(), "notification subscriber ready");
    Ok(consumer)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let mut broker = Broker::connect().await?;

    'outer: loop {
        if let Err(err) = broker.ensure_connected().await {
            error!(error = %err, "broker unreachable, retrying");
            tokio::time::sleep(RECONNECT_DELAY).await;
            continue;
        }
        let mut consumer = match subscribe(&broker).await {
            Ok(consumer) => consumer,
            Err(err) => {
                error!(error = %err, "failed to subscribe, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        };

        loop {
            let delivery = tokio::select! {
                _ = tokio::signal::ctrl_c() => break 'outer,
                next = consumer.next() => match next {
                    Some(Ok(delivery)) => delivery,
                    Some(Err(err)) => {
                        error!(error = %err, "failed to receive delivery");
                        continue;
                    }
                    None => {
                        warn!("status stream ended, resubscribing");
                        break;
                    }
                },
            };

            match serde_json::from_slice::<StatusMessage>(&delivery.data) {
                Ok(update) => {
                    info!(
                        order_number = %update.order_number,
                        old_status = %update.old_status,
                        new_status = %update.new_status,
                        changed_by = %update.changed_by,
                        estimated_completion = ?update.estimated_completion,
                        "order status changed"
                    );
                    if let Err(err) = delivery.ack(BasicAckOptions::default()).await {
                        error!(error = %err, "failed to ack notification");
                    }
                }
                Err(err) => {
                    error!(error = %err, "undecodable status message");
                    let _ = delivery
                        .nack(BasicNackOptions {
                            requeue: false,
                            ..Default::default()
                        })
                        .await;
                }
            }
        }
    }

    info!("notification subscriber stopped");
    broker.close().await;
    Ok(())
}
