use chrono::Utc;
use diesel::{insert_into, prelude::*, update, PgConnection};

use resto_core::error::Error;
use resto_core::models::{NewOrderStatusLog, Order, OrderStatus};
use resto_core::schema::{order_status_log, orders};

/// Result of attempting the `received -> cooking` transition.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StartCooking {
    /// Fresh transition: status row updated, log row appended.
    Started,
    /// Redelivery of a message this worker already moved to `cooking`.
    /// No second log row, no double counting; the caller re-publishes the
    /// cooking event and proceeds.
    Resumed,
    /// The order is already `ready` or beyond. Re-processing would cook it
    /// twice; the caller acks the message and moves on.
    AlreadyProcessed,
}

fn find_for_update(conn: &mut PgConnection, order_number: &str) -> QueryResult<Order> {
    orders::table
        .filter(orders::number.eq(order_number))
        .select(Order::as_select())
        .for_update()
        .first(conn)
}

/// Claim decision for a delivered order, separated from the row lock so each
/// arm stands on its own. Redelivery to the worker that already holds the
/// order resumes it; a different worker holding it is a conflict; a finished
/// order is never re-cooked.
pub fn claim(
    status: OrderStatus,
    processed_by: Option<&str>,
    worker_name: &str,
) -> Result<StartCooking, Error> {
    match status {
        OrderStatus::Received => Ok(StartCooking::Started),
        OrderStatus::Cooking if processed_by == Some(worker_name) => Ok(StartCooking::Resumed),
        OrderStatus::Cooking => Err(Error::AlreadyCooking),
        OrderStatus::Ready | OrderStatus::Completed | OrderStatus::Cancelled => {
            Ok(StartCooking::AlreadyProcessed)
        }
    }
}

/// Moves the order into `cooking` in one transaction. The row lock plus the
/// broker's single-unacked-message semantics are the only mutual exclusion;
/// a racing consumer that finds the order claimed by someone else gets the
/// conflict and requeues.
pub fn start_cooking(
    conn: &mut PgConnection,
    order_number: &str,
    worker_name: &str,
) -> Result<StartCooking, Error> {
    conn.transaction::<_, Error, _>(|conn| {
        let order = find_for_update(conn, order_number)?;

        match claim(order.status, order.processed_by.as_deref(), worker_name)? {
            StartCooking::Started => {
                update(orders::table.find(order.id))
                    .set((
                        orders::status.eq(OrderStatus::Cooking),
                        orders::processed_by.eq(worker_name),
                        orders::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)?;
                insert_into(order_status_log::table)
                    .values(&NewOrderStatusLog {
                        order_id: order.id,
                        status: OrderStatus::Cooking,
                        changed_by: worker_name.to_string(),
                        notes: Some("started cooking".to_string()),
                    })
                    .execute(conn)?;
                Ok(StartCooking::Started)
            }
            // Resumed appends no second log row and bumps no counter.
            other => Ok(other),
        }
    })
}

/// Moves the order into `ready` and stamps `completed_at` in one
/// transaction. Idempotent when the order is already `ready`.
pub fn complete_order(
    conn: &mut PgConnection,
    order_number: &str,
    worker_name: &str,
) -> Result<(), Error> {
    conn.transaction::<_, Error, _>(|conn| {
        let order = find_for_update(conn, order_number)?;

        match order.status {
            OrderStatus::Cooking => {
                update(orders::table.find(order.id))
                    .set((
                        orders::status.eq(OrderStatus::Ready),
                        orders::processed_by.eq(worker_name),
                        orders::completed_at.eq(Utc::now()),
                        orders::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)?;
                insert_into(order_status_log::table)
                    .values(&NewOrderStatusLog {
                        order_id: order.id,
                        status: OrderStatus::Ready,
                        changed_by: worker_name.to_string(),
                        notes: Some("order ready".to_string()),
                    })
                    .execute(conn)?;
                Ok(())
            }
            OrderStatus::Ready => Ok(()),
            _ => Err(Error::AlreadyCooking),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn received_order_starts_fresh() {
        let decision = claim(OrderStatus::Received, None, "chef-1").unwrap();
        assert_eq!(decision, StartCooking::Started);
    }

    #[test]
    fn redelivery_to_the_claiming_worker_resumes() {
        let decision = claim(OrderStatus::Cooking, Some("chef-1"), "chef-1").unwrap();
        assert_eq!(decision, StartCooking::Resumed);
    }

    #[test]
    fn order_claimed_by_another_worker_conflicts() {
        let decision = claim(OrderStatus::Cooking, Some("chef-2"), "chef-1");
        assert!(matches!(decision, Err(Error::AlreadyCooking)));

        let decision = claim(OrderStatus::Cooking, None, "chef-1");
        assert!(matches!(decision, Err(Error::AlreadyCooking)));
    }

    #[test]
    fn finished_orders_are_never_recooked() {
        for status in [
            OrderStatus::Ready,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            let decision = claim(status, Some("chef-1"), "chef-1").unwrap();
            assert_eq!(decision, StartCooking::AlreadyProcessed);
        }
    }
}
