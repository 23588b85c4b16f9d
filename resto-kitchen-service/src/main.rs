use std::process::exit;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use resto_core::broker::Broker;
use resto_core::error::Error;
use resto_core::establish_connection;
use resto_kitchen_service::capabilities::Capabilities;
use resto_kitchen_service::consumer;
use resto_kitchen_service::cook_time::FixedSchedule;
use resto_kitchen_service::registry;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Unique kitchen worker name
    #[arg(long)]
    name: String,

    /// Comma-separated order types this worker accepts; empty accepts all
    #[arg(long, default_value = "")]
    order_types: String,

    /// Maximum unacknowledged messages outstanding to this consumer
    #[arg(long, default_value_t = 1)]
    prefetch: u16,

    /// Heartbeat interval in seconds
    #[arg(long, default_value_t = 30)]
    heartbeat_interval: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let capabilities = Capabilities::parse_list(&cli.order_types).unwrap_or_else(|err| {
        error!(error = %err, "invalid --order-types");
        exit(2);
    });

    let conn = &mut establish_connection();
    let worker = match registry::register(conn, &cli.name, &capabilities) {
        Ok(worker) => worker,
        Err(Error::WorkerAlreadyOnline) => {
            error!(worker = %cli.name, "a worker is already online under this name");
            exit(1);
        }
        Err(err) => {
            error!(error = %err, "failed to register worker");
            exit(1);
        }
    };
    info!(
        worker = %worker.name,
        worker_type = %worker.worker_type,
        orders_processed = worker.orders_processed,
        "worker registered"
    );

    let mut broker = Broker::connect().await?;
    let queue_name =
        consumer::declare_queue(&broker, &worker.name, &capabilities, cli.prefetch).await?;

    let shutdown = CancellationToken::new();

    let heartbeat_token = shutdown.clone();
    let worker_id = worker.id;
    let heartbeat_every = Duration::from_secs(cli.heartbeat_interval);
    let heartbeat = tokio::spawn(async move {
        // Own connection: a slow order must never delay a heartbeat.
        let conn = &mut establish_connection();
        let mut ticker = tokio::time::interval(heartbeat_every);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = heartbeat_token.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(err) = registry::heartbeat(conn, worker_id) {
                        error!(error = %err, "heartbeat failed");
                    }
                }
            }
        }
    });

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            shutdown.cancel();
        });
    }

    let estimator = FixedSchedule;
    let outcome: Result<(), lapin::Error> = 'consume: loop {
        match consumer::run(
            &broker,
            conn,
            &queue_name,
            &worker.name,
            &capabilities,
            &estimator,
            shutdown.clone(),
        )
        .await
        {
            Ok(exit) => {
                if !exit.should_resubscribe(shutdown.is_cancelled()) {
                    break Ok(());
                }
                info!(worker = %worker.name, "reconnecting to broker");
                loop {
                    let restored = match broker.ensure_connected().await {
                        Ok(()) => {
                            consumer::declare_queue(&broker, &worker.name, &capabilities, cli.prefetch)
                                .await
                                .map(|_| ())
                        }
                        Err(err) => Err(err),
                    };
                    match restored {
                        Ok(()) => break,
                        Err(err) => {
                            error!(error = %err, "broker unreachable, retrying");
                            tokio::select! {
                                _ = shutdown.cancelled() => break 'consume Ok(()),
                                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                            }
                        }
                    }
                }
            }
            Err(err) => break Err(err),
        }
    };

    // The token must fall before the heartbeat join, whatever ended the
    // consume loop, or a dead consumer keeps advertising itself online.
    shutdown.cancel();
    let _ = heartbeat.await;
    if let Err(err) = registry::mark_offline(conn, worker.id) {
        error!(error = %err, "failed to mark worker offline");
    }
    info!(worker = %worker.name, "worker offline");
    broker.close().await;
    outcome?;

    Ok(())
}
