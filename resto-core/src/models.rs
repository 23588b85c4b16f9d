use std::fmt;
use std::io::Write;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use diesel::{
    deserialize::{self, FromSql, FromSqlRow},
    expression::AsExpression,
    pg::{Pg, PgValue},
    prelude::*,
    serialize::{self, IsNull, Output, ToSql},
};
use serde::{Deserialize, Serialize};

use crate::schema::{order_items, order_status_log, orders, workers};
use crate::WORKER_STALENESS_SECS;

#[derive(
    FromSqlRow, AsExpression, Serialize, Deserialize, PartialEq, Eq, Hash, Copy, Clone, Debug,
)]
#[diesel(sql_type = crate::schema::sql_types::OrderType)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    DineIn,
    Takeout,
    Delivery,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::DineIn => "dine_in",
            OrderType::Takeout => "takeout",
            OrderType::Delivery => "delivery",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dine_in" => Ok(OrderType::DineIn),
            "takeout" => Ok(OrderType::Takeout),
            "delivery" => Ok(OrderType::Delivery),
            other => Err(format!("unknown order type: {}", other)),
        }
    }
}

impl ToSql<crate::schema::sql_types::OrderType, Pg> for OrderType {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<crate::schema::sql_types::OrderType, Pg> for OrderType {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"dine_in" => Ok(OrderType::DineIn),
            b"takeout" => Ok(OrderType::Takeout),
            b"delivery" => Ok(OrderType::Delivery),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

#[derive(FromSqlRow, AsExpression, Serialize, Deserialize, PartialEq, Copy, Clone, Debug)]
#[diesel(sql_type = crate::schema::sql_types::OrderStatus)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Received,
    Cooking,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Received => "received",
            OrderStatus::Cooking => "cooking",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql<crate::schema::sql_types::OrderStatus, Pg> for OrderStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<crate::schema::sql_types::OrderStatus, Pg> for OrderStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"received" => Ok(OrderStatus::Received),
            b"cooking" => Ok(OrderStatus::Cooking),
            b"ready" => Ok(OrderStatus::Ready),
            b"completed" => Ok(OrderStatus::Completed),
            b"cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

#[derive(FromSqlRow, AsExpression, Serialize, Deserialize, PartialEq, Copy, Clone, Debug)]
#[diesel(sql_type = crate::schema::sql_types::WorkerStatus)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Online,
    Offline,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Online => "online",
            WorkerStatus::Offline => "offline",
        }
    }
}

impl ToSql<crate::schema::sql_types::WorkerStatus, Pg> for WorkerStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<crate::schema::sql_types::WorkerStatus, Pg> for WorkerStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"online" => Ok(WorkerStatus::Online),
            b"offline" => Ok(WorkerStatus::Offline),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug, PartialEq)]
#[diesel(table_name = orders)]
pub struct Order {
    pub id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub number: String,
    pub customer_name: String,
    pub order_type: OrderType,
    pub table_number: Option<i32>,
    pub delivery_address: Option<String>,
    pub total_amount: BigDecimal,
    pub priority: i32,
    pub status: OrderStatus,
    pub processed_by: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Debug, PartialEq)]
#[diesel(table_name = orders)]
pub struct NewOrder {
    pub number: String,
    pub customer_name: String,
    pub order_type: OrderType,
    pub table_number: Option<i32>,
    pub delivery_address: Option<String>,
    pub total_amount: BigDecimal,
    pub priority: i32,
    pub status: OrderStatus,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Debug, PartialEq)]
#[diesel(belongs_to(Order))]
#[diesel(table_name = order_items)]
pub struct OrderItem {
    pub id: i32,
    pub created_at: DateTime<Utc>,
    pub order_id: i32,
    pub name: String,
    pub quantity: i32,
    pub price: BigDecimal,
}

#[derive(Insertable, Debug, PartialEq)]
#[diesel(table_name = order_items)]
pub struct NewOrderItem {
    pub order_id: i32,
    pub name: String,
    pub quantity: i32,
    pub price: BigDecimal,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Debug, PartialEq)]
#[diesel(belongs_to(Order))]
#[diesel(table_name = order_status_log)]
pub struct OrderStatusLog {
    pub id: i32,
    pub created_at: DateTime<Utc>,
    pub order_id: i32,
    pub status: OrderStatus,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Insertable, Debug, PartialEq)]
#[diesel(table_name = order_status_log)]
pub struct NewOrderStatusLog {
    pub order_id: i32,
    pub status: OrderStatus,
    pub changed_by: String,
    pub notes: Option<String>,
}

#[derive(Queryable, Selectable, Identifiable, Debug, PartialEq)]
#[diesel(table_name = workers)]
pub struct Worker {
    pub id: i32,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub worker_type: String,
    pub status: WorkerStatus,
    pub last_seen: DateTime<Utc>,
    pub orders_processed: i32,
    pub order_types: Vec<String>,
}

#[derive(Insertable, Debug, PartialEq)]
#[diesel(table_name = workers)]
pub struct NewWorker {
    pub name: String,
    pub worker_type: String,
    pub status: WorkerStatus,
    pub last_seen: DateTime<Utc>,
    pub orders_processed: i32,
    pub order_types: Vec<String>,
}

impl Worker {
    /// Liveness as tracking queries must report it. A worker whose last
    /// heartbeat is older than the staleness threshold reads as offline no
    /// matter what the stored column says, since an uncleanly crashed
    /// process never writes its own offline mark.
    pub fn effective_status(&self, now: DateTime<Utc>) -> WorkerStatus {
        if now - self.last_seen > Duration::seconds(WORKER_STALENESS_SECS) {
            WorkerStatus::Offline
        } else {
            self.status
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_type_round_trips_through_str() {
        for t in [OrderType::DineIn, OrderType::Takeout, OrderType::Delivery] {
            assert_eq!(t.as_str().parse::<OrderType>().unwrap(), t);
        }
        assert!("drive_thru".parse::<OrderType>().is_err());
    }

    #[test]
    fn stale_heartbeat_reads_offline() {
        let now = Utc::now();
        let mut worker = Worker {
            id: 1,
            created_at: now,
            name: "chef-1".to_string(),
            worker_type: "general".to_string(),
            status: WorkerStatus::Online,
            last_seen: now - Duration::seconds(WORKER_STALENESS_SECS + 1),
            orders_processed: 0,
            order_types: vec![],
        };
        assert_eq!(worker.effective_status(now), WorkerStatus::Offline);

        worker.last_seen = now - Duration::seconds(5);
        assert_eq!(worker.effective_status(now), WorkerStatus::Online);
    }

    #[test]
    fn stored_offline_wins_over_fresh_heartbeat() {
        let now = Utc::now();
        let worker = Worker {
            id: 1,
            created_at: now,
            name: "chef-1".to_string(),
            worker_type: "general".to_string(),
            status: WorkerStatus::Offline,
            last_seen: now,
            orders_processed: 0,
            order_types: vec![],
        };
        assert_eq!(worker.effective_status(now), WorkerStatus::Offline);
    }
}
