use bigdecimal::{num_bigint::BigInt, BigDecimal};
use chrono::Utc;
use diesel::{insert_into, prelude::*, PgConnection};
use serde::Deserialize;
use tracing::warn;

use resto_core::error::Error;
use resto_core::messages::OrderMessage;
use resto_core::models::{
    NewOrder, NewOrderItem, NewOrderStatusLog, Order, OrderItem, OrderStatus, OrderType,
};
use resto_core::schema::{order_items, order_status_log, orders};

use crate::events::OrderEventPublisher;
use crate::sequence;

/// Raw intake payload. `order_type` stays a string until validation so an
/// unknown type produces a field-level message instead of a decode failure.
#[derive(Deserialize, Clone, Debug)]
pub struct OrderCandidate {
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub order_type: String,
    pub table_number: Option<i32>,
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub items: Vec<ItemCandidate>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ItemCandidate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: i32,
    #[serde(default)]
    pub price: BigDecimal,
}

/// Outcome of intake. The order is committed before the publish happens, so
/// a failed publish still returns the persisted order; the gap is handed to
/// the external reconciliation sweep, never retried here.
pub struct OrderReceipt {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub publish_error: Option<lapin::Error>,
}

fn min_price() -> BigDecimal {
    BigDecimal::new(BigInt::from(1), 2)
}

fn max_price() -> BigDecimal {
    BigDecimal::new(BigInt::from(99_999), 2)
}

fn valid_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphabetic() || c.is_ascii_whitespace() || c == '\'' || c == '-')
}

/// Checks every invariant and collects field-level messages rather than
/// stopping at the first violation. Returns the parsed order type on success.
pub fn validate(candidate: &OrderCandidate) -> Result<OrderType, Error> {
    let mut errors = Vec::new();

    if candidate.customer_name.is_empty() {
        errors.push("customer_name is required".to_string());
    } else if candidate.customer_name.chars().count() > 100 {
        errors.push("customer_name must be 100 characters or less".to_string());
    } else if !valid_name(&candidate.customer_name) {
        errors.push("customer_name contains invalid characters".to_string());
    }

    let order_type = match candidate.order_type.parse::<OrderType>() {
        Ok(t) => Some(t),
        Err(_) => {
            errors.push("order_type must be one of: dine_in, takeout, delivery".to_string());
            None
        }
    };

    match order_type {
        Some(OrderType::DineIn) => {
            match candidate.table_number {
                None => errors.push("table_number is required for dine_in orders".to_string()),
                Some(n) if !(1..=100).contains(&n) => {
                    errors.push("table_number must be between 1 and 100".to_string())
                }
                Some(_) => {}
            }
            if candidate.delivery_address.is_some() {
                errors.push("delivery_address must not be present for dine_in orders".to_string());
            }
        }
        Some(OrderType::Delivery) => {
            match &candidate.delivery_address {
                None => errors.push("delivery_address is required for delivery orders".to_string()),
                Some(addr) if addr.chars().count() < 10 => {
                    errors.push("delivery_address must be at least 10 characters".to_string())
                }
                Some(_) => {}
            }
            if candidate.table_number.is_some() {
                errors.push("table_number must not be present for delivery orders".to_string());
            }
        }
        Some(OrderType::Takeout) => {
            if candidate.table_number.is_some() {
                errors.push("table_number must not be present for takeout orders".to_string());
            }
            if candidate.delivery_address.is_some() {
                errors.push("delivery_address must not be present for takeout orders".to_string());
            }
        }
        None => {}
    }

    if candidate.items.is_empty() {
        errors.push("items must contain at least 1 item".to_string());
    } else if candidate.items.len() > 20 {
        errors.push("items cannot contain more than 20 items".to_string());
    }

    for (i, item) in candidate.items.iter().enumerate() {
        if item.name.is_empty() {
            errors.push(format!("items[{}].name is required", i));
        } else if item.name.chars().count() > 50 {
            errors.push(format!("items[{}].name must be 50 characters or less", i));
        }

        if !(1..=10).contains(&item.quantity) {
            errors.push(format!("items[{}].quantity must be between 1 and 10", i));
        }

        if item.price < min_price() || item.price > max_price() {
            errors.push(format!("items[{}].price must be between 0.01 and 999.99", i));
        }
    }

    match order_type {
        Some(t) if errors.is_empty() => Ok(t),
        _ => Err(Error::Validation(errors)),
    }
}

/// Σ(price × quantity), exact. Caller-supplied totals are never trusted.
pub fn total_amount(items: &[ItemCandidate]) -> BigDecimal {
    items
        .iter()
        .map(|item| &item.price * BigDecimal::from(item.quantity))
        .sum()
}

pub fn priority_for(total: &BigDecimal) -> i32 {
    if *total > BigDecimal::from(100) {
        10
    } else if *total >= BigDecimal::from(50) {
        5
    } else {
        1
    }
}

/// The intake pipeline: validate, derive, persist in one transaction, then
/// publish the creation event. Steps 4-6 of the pipeline share one
/// transaction, so a failed insert issues no order number; the post-commit
/// publish is the deliberate dual-write gap.
pub async fn create_order(
    conn: &mut PgConnection,
    publisher: &OrderEventPublisher<'_>,
    candidate: OrderCandidate,
) -> Result<OrderReceipt, Error> {
    let order_type = validate(&candidate)?;
    let total = total_amount(&candidate.items);
    let priority = priority_for(&total);

    let (order, items) = conn.transaction::<_, diesel::result::Error, _>(|conn| {
        let date = sequence::sequence_date(Utc::now());
        let seq = sequence::next_sequence(conn, &date)?;

        let order: Order = insert_into(orders::table)
            .values(&NewOrder {
                number: sequence::order_number(&date, seq),
                customer_name: candidate.customer_name.clone(),
                order_type,
                table_number: candidate.table_number,
                delivery_address: candidate.delivery_address.clone(),
                total_amount: total.clone(),
                priority,
                status: OrderStatus::Received,
            })
            .returning(Order::as_returning())
            .get_result(conn)?;

        let new_items = candidate
            .items
            .iter()
            .map(|item| NewOrderItem {
                order_id: order.id,
                name: item.name.clone(),
                quantity: item.quantity,
                price: item.price.clone(),
            })
            .collect::<Vec<_>>();
        let items = insert_into(order_items::table)
            .values(&new_items)
            .returning(OrderItem::as_returning())
            .get_results(conn)?;

        insert_into(order_status_log::table)
            .values(&NewOrderStatusLog {
                order_id: order.id,
                status: OrderStatus::Received,
                changed_by: "system".to_string(),
                notes: None,
            })
            .execute(conn)?;

        Ok((order, items))
    })?;

    let message = OrderMessage::from_order(&order, &items);
    let publish_error = match publisher.order_created(&message).await {
        Ok(()) => None,
        Err(err) => {
            warn!(
                order_number = %order.number,
                error = %err,
                "order saved but creation event not published"
            );
            Some(err)
        }
    };

    Ok(OrderReceipt {
        order,
        items,
        publish_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, quantity: i32, price: &str) -> ItemCandidate {
        ItemCandidate {
            name: name.to_string(),
            quantity,
            price: price.parse().unwrap(),
        }
    }

    fn takeout(items: Vec<ItemCandidate>) -> OrderCandidate {
        OrderCandidate {
            customer_name: "Mary O'Brien-Smith".to_string(),
            order_type: "takeout".to_string(),
            table_number: None,
            delivery_address: None,
            items,
        }
    }

    fn messages(result: Result<OrderType, Error>) -> Vec<String> {
        match result {
            Err(Error::Validation(msgs)) => msgs,
            other => panic!("expected validation failure, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn takeout_with_two_items_derives_total_and_priority() {
        let candidate = takeout(vec![item("Burger", 2, "5.00"), item("Fries", 1, "3.00")]);
        assert_eq!(validate(&candidate).unwrap(), OrderType::Takeout);

        let total = total_amount(&candidate.items);
        assert_eq!(total, "13.00".parse::<BigDecimal>().unwrap());
        assert_eq!(priority_for(&total), 1);
    }

    #[test]
    fn priority_thresholds() {
        assert_eq!(priority_for(&"49.99".parse().unwrap()), 1);
        assert_eq!(priority_for(&"50.00".parse().unwrap()), 5);
        assert_eq!(priority_for(&"100.00".parse().unwrap()), 5);
        assert_eq!(priority_for(&"100.01".parse().unwrap()), 10);
    }

    #[test]
    fn dine_in_requires_table_number() {
        let candidate = OrderCandidate {
            customer_name: "Ada".to_string(),
            order_type: "dine_in".to_string(),
            table_number: None,
            delivery_address: None,
            items: vec![item("Soup", 1, "4.50")],
        };
        let msgs = messages(validate(&candidate));
        assert!(msgs.iter().any(|m| m.contains("table_number")));
    }

    #[test]
    fn dine_in_rejects_delivery_address() {
        let candidate = OrderCandidate {
            customer_name: "Ada".to_string(),
            order_type: "dine_in".to_string(),
            table_number: Some(12),
            delivery_address: Some("221B Baker Street, London".to_string()),
            items: vec![item("Soup", 1, "4.50")],
        };
        let msgs = messages(validate(&candidate));
        assert_eq!(
            msgs,
            vec!["delivery_address must not be present for dine_in orders"]
        );
    }

    #[test]
    fn delivery_requires_long_enough_address() {
        let mut candidate = OrderCandidate {
            customer_name: "Ada".to_string(),
            order_type: "delivery".to_string(),
            table_number: None,
            delivery_address: Some("short".to_string()),
            items: vec![item("Pizza", 1, "12.00")],
        };
        let msgs = messages(validate(&candidate));
        assert!(msgs
            .iter()
            .any(|m| m == "delivery_address must be at least 10 characters"));

        candidate.delivery_address = Some("1 Infinite Loop, Cupertino".to_string());
        assert_eq!(validate(&candidate).unwrap(), OrderType::Delivery);
    }

    #[test]
    fn takeout_forbids_table_and_address() {
        let mut candidate = takeout(vec![item("Soup", 1, "4.50")]);
        candidate.table_number = Some(3);
        candidate.delivery_address = Some("221B Baker Street, London".to_string());
        let msgs = messages(validate(&candidate));
        assert_eq!(msgs.len(), 2);
    }

    #[test]
    fn customer_name_charset_is_enforced() {
        let mut candidate = takeout(vec![item("Soup", 1, "4.50")]);
        candidate.customer_name = "R2-D2 <admin>".to_string();
        let msgs = messages(validate(&candidate));
        assert_eq!(msgs, vec!["customer_name contains invalid characters"]);

        candidate.customer_name = "".to_string();
        let msgs = messages(validate(&candidate));
        assert_eq!(msgs, vec!["customer_name is required"]);

        candidate.customer_name = "a".repeat(101);
        let msgs = messages(validate(&candidate));
        assert_eq!(msgs, vec!["customer_name must be 100 characters or less"]);
    }

    #[test]
    fn item_bounds_are_enforced() {
        let candidate = takeout(vec![
            item("", 1, "4.50"),
            item("Soup", 0, "4.50"),
            item("Stew", 11, "4.50"),
            item("Cake", 1, "0.00"),
            item("Tea", 1, "1000.00"),
        ]);
        let msgs = messages(validate(&candidate));
        assert!(msgs.contains(&"items[0].name is required".to_string()));
        assert!(msgs.contains(&"items[1].quantity must be between 1 and 10".to_string()));
        assert!(msgs.contains(&"items[2].quantity must be between 1 and 10".to_string()));
        assert!(msgs.contains(&"items[3].price must be between 0.01 and 999.99".to_string()));
        assert!(msgs.contains(&"items[4].price must be between 0.01 and 999.99".to_string()));
    }

    #[test]
    fn price_bounds_are_inclusive() {
        let candidate = takeout(vec![item("Penny sweet", 1, "0.01"), item("Feast", 1, "999.99")]);
        assert!(validate(&candidate).is_ok());
    }

    #[test]
    fn empty_and_oversized_item_lists_fail() {
        let msgs = messages(validate(&takeout(vec![])));
        assert_eq!(msgs, vec!["items must contain at least 1 item"]);

        let many = (0..21).map(|_| item("Soup", 1, "4.50")).collect();
        let msgs = messages(validate(&takeout(many)));
        assert_eq!(msgs, vec!["items cannot contain more than 20 items"]);
    }

    #[test]
    fn quantity_multiplies_exactly() {
        let total = total_amount(&[item("Espresso", 3, "2.35"), item("Tart", 2, "0.05")]);
        assert_eq!(total, "7.15".parse::<BigDecimal>().unwrap());
    }
}
