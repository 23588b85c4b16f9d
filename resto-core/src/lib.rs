use std::env;

use diesel::{Connection, PgConnection};
use dotenvy::dotenv;

pub mod broker;
pub mod error;
pub mod messages;
pub mod models;
pub mod schema;

/// Heartbeats older than this read as offline on the tracking path.
pub const WORKER_STALENESS_SECS: i64 = 60;

pub fn establish_connection() -> PgConnection {
    dotenv().ok();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgConnection::establish(&database_url)
        .unwrap_or_else(|_| panic!("Error connecting to {}", database_url))
}
