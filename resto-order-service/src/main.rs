use std::env;
use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, response::Json, routing::post, Router};
use bigdecimal::BigDecimal;
use dotenvy::dotenv;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use uuid::Uuid;

use resto_core::broker::Broker;
use resto_core::establish_connection;
use resto_order_service::events::OrderEventPublisher;
use resto_order_service::intake::{self, OrderCandidate};

mod error;

use error::ApiError;

#[derive(Clone)]
struct AppState {
    broker: Arc<Broker>,
}

#[derive(Serialize)]
struct CreateOrderResponse {
    order_number: String,
    status: String,
    total_amount: BigDecimal,
}

async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(candidate): Json<OrderCandidate>,
) -> Result<Json<CreateOrderResponse>, ApiError> {
    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    info!(
        request_id = %request_id,
        customer_name = %candidate.customer_name,
        items = candidate.items.len(),
        "order request received"
    );

    let conn = &mut establish_connection();
    let publisher = OrderEventPublisher::new(&state.broker);
    let receipt = intake::create_order(conn, &publisher, candidate)
        .await
        .map_err(ApiError::from)?;

    if let Some(err) = receipt.publish_error {
        error!(
            request_id = %request_id,
            order_number = %receipt.order.number,
            error = %err,
            "order persisted but creation event not published"
        );
        return Err(ApiError::Internal);
    }

    info!(
        request_id = %request_id,
        order_number = %receipt.order.number,
        priority = receipt.order.priority,
        "order created"
    );

    Ok(Json(CreateOrderResponse {
        order_number: receipt.order.number,
        status: receipt.order.status.to_string(),
        total_amount: receipt.order.total_amount,
    }))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let broker = Broker::connect().await?;
    let state = AppState {
        broker: Arc::new(broker),
    };

    let app = Router::new()
        .route("/orders", post(create_order))
        .with_state(state)
        .layer(CorsLayer::permissive());

    let addr = env::var("ORDER_SERVICE_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("order service listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
