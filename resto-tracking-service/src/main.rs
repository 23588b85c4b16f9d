use std::env;

use axum::{
    extract::Path,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use dotenvy::dotenv;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use resto_core::establish_connection;
use resto_tracking_service::queries;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<serde_json::Value>)>;

fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "order not found" })),
    )
}

fn internal() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal server error" })),
    )
}

async fn order_status(Path(number): Path<String>) -> ApiResult<queries::OrderStatusView> {
    let conn = &mut establish_connection();
    match queries::order_status(conn, &number) {
        Ok(Some(view)) => Ok(Json(view)),
        Ok(None) => Err(not_found()),
        Err(err) => {
            error!(order_number = %number, error = %err, "order status query failed");
            Err(internal())
        }
    }
}

async fn order_history(Path(number): Path<String>) -> ApiResult<Vec<queries::HistoryEntry>> {
    let conn = &mut establish_connection();
    match queries::order_history(conn, &number) {
        Ok(Some(entries)) => Ok(Json(entries)),
        Ok(None) => Err(not_found()),
        Err(err) => {
            error!(order_number = %number, error = %err, "order history query failed");
            Err(internal())
        }
    }
}

async fn workers_status() -> ApiResult<Vec<queries::WorkerView>> {
    let conn = &mut establish_connection();
    match queries::workers_status(conn) {
        Ok(workers) => Ok(Json(workers)),
        Err(err) => {
            error!(error = %err, "workers status query failed");
            Err(internal())
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let app = Router::new()
        .route("/orders/{number}/status", get(order_status))
        .route("/orders/{number}/history", get(order_history))
        .route("/workers/status", get(workers_status))
        .layer(CorsLayer::permissive());

    let addr = env::var("TRACKING_SERVICE_ADDR").unwrap_or_else(|_| "0.0.0.0:3002".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("tracking service listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
