use chrono::{DateTime, Duration, Utc};
use diesel::{prelude::*, PgConnection};
use serde::Serialize;

use resto_core::models::{Order, OrderStatus, OrderStatusLog, Worker};
use resto_core::schema::{order_status_log, orders, workers};

/// Rough customer-facing estimate while an order is on the stove.
const COOKING_ESTIMATE_MINUTES: i64 = 10;

#[derive(Serialize, Debug, PartialEq)]
pub struct OrderStatusView {
    pub order_number: String,
    pub current_status: OrderStatus,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct HistoryEntry {
    pub status: OrderStatus,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct WorkerView {
    pub worker_name: String,
    pub status: &'static str,
    pub orders_processed: i32,
    pub last_seen: DateTime<Utc>,
}

pub fn status_view(order: &Order) -> OrderStatusView {
    let estimated_completion = match order.status {
        OrderStatus::Cooking => {
            Some(order.updated_at + Duration::minutes(COOKING_ESTIMATE_MINUTES))
        }
        _ => None,
    };
    OrderStatusView {
        order_number: order.number.clone(),
        current_status: order.status,
        updated_at: order.updated_at,
        processed_by: order.processed_by.clone(),
        estimated_completion,
    }
}

pub fn order_status(
    conn: &mut PgConnection,
    order_number: &str,
) -> QueryResult<Option<OrderStatusView>> {
    let order = orders::table
        .filter(orders::number.eq(order_number))
        .select(Order::as_select())
        .first::<Order>(conn)
        .optional()?;
    Ok(order.as_ref().map(status_view))
}

pub fn order_history(
    conn: &mut PgConnection,
    order_number: &str,
) -> QueryResult<Option<Vec<HistoryEntry>>> {
    let order = orders::table
        .filter(orders::number.eq(order_number))
        .select(Order::as_select())
        .first::<Order>(conn)
        .optional()?;
    let Some(order) = order else {
        return Ok(None);
    };

    let entries = OrderStatusLog::belonging_to(&order)
        .select(OrderStatusLog::as_select())
        .order(order_status_log::changed_at.asc())
        .load::<OrderStatusLog>(conn)?
        .into_iter()
        .map(|row| HistoryEntry {
            status: row.status,
            changed_by: row.changed_by,
            changed_at: row.changed_at,
            notes: row.notes,
        })
        .collect();
    Ok(Some(entries))
}

pub fn workers_status(conn: &mut PgConnection) -> QueryResult<Vec<WorkerView>> {
    let now = Utc::now();
    let rows = workers::table
        .select(Worker::as_select())
        .order(workers::name.asc())
        .load::<Worker>(conn)?;
    Ok(rows
        .into_iter()
        .map(|worker| WorkerView {
            status: worker.effective_status(now).as_str(),
            worker_name: worker.name,
            orders_processed: worker.orders_processed,
            last_seen: worker.last_seen,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use resto_core::models::OrderType;

    fn order(status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: 1,
            created_at: now,
            updated_at: now,
            number: "ORD_20260825_001".to_string(),
            customer_name: "Ada".to_string(),
            order_type: OrderType::Takeout,
            table_number: None,
            delivery_address: None,
            total_amount: BigDecimal::from(13),
            priority: 1,
            status,
            processed_by: Some("chef-1".to_string()),
            completed_at: None,
        }
    }

    #[test]
    fn cooking_orders_get_an_estimate() {
        let order = order(OrderStatus::Cooking);
        let view = status_view(&order);
        assert_eq!(
            view.estimated_completion,
            Some(order.updated_at + Duration::minutes(COOKING_ESTIMATE_MINUTES))
        );
    }

    #[test]
    fn non_cooking_orders_have_no_estimate() {
        for status in [OrderStatus::Received, OrderStatus::Ready] {
            assert_eq!(status_view(&order(status)).estimated_completion, None);
        }
    }
}
