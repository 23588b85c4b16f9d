use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Order, OrderItem, OrderStatus, OrderType};

/// Body of an order-created event on the topic exchange. Kitchen workers
/// bind on the routing key, so the payload carries everything a worker
/// needs without a read back to the store.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderMessage {
    pub order_number: String,
    pub customer_name: String,
    pub order_type: OrderType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_number: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<String>,
    pub items: Vec<OrderMessageItem>,
    pub total_amount: BigDecimal,
    pub priority: i32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderMessageItem {
    pub name: String,
    pub quantity: i32,
    pub price: BigDecimal,
}

impl OrderMessage {
    pub fn from_order(order: &Order, items: &[OrderItem]) -> Self {
        OrderMessage {
            order_number: order.number.clone(),
            customer_name: order.customer_name.clone(),
            order_type: order.order_type,
            table_number: order.table_number,
            delivery_address: order.delivery_address.clone(),
            items: items
                .iter()
                .map(|i| OrderMessageItem {
                    name: i.name.clone(),
                    quantity: i.quantity,
                    price: i.price.clone(),
                })
                .collect(),
            total_amount: order.total_amount.clone(),
            priority: order.priority,
        }
    }

    /// Routing key on the orders topic exchange. Workers subscribe to a
    /// subset of order types with a `kitchen.<type>.*` binding.
    pub fn routing_key(&self) -> String {
        format!("kitchen.{}.{}", self.order_type, self.priority)
    }
}

/// Body of a status-changed event on the fanout exchange, consumed by the
/// notification subscriber.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StatusMessage {
    pub order_number: String,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
    pub changed_by: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_key_encodes_type_and_priority() {
        let message = OrderMessage {
            order_number: "ORD_20260825_001".to_string(),
            customer_name: "Ada".to_string(),
            order_type: OrderType::Delivery,
            table_number: None,
            delivery_address: Some("12 Fleet Street, London".to_string()),
            items: vec![],
            total_amount: BigDecimal::from(120),
            priority: 10,
        };
        assert_eq!(message.routing_key(), "kitchen.delivery.10");
    }

    #[test]
    fn order_message_uses_wire_field_names() {
        let message = OrderMessage {
            order_number: "ORD_20260825_002".to_string(),
            customer_name: "Grace".to_string(),
            order_type: OrderType::Takeout,
            table_number: None,
            delivery_address: None,
            items: vec![OrderMessageItem {
                name: "Soup".to_string(),
                quantity: 2,
                price: "5.00".parse().unwrap(),
            }],
            total_amount: "10.00".parse().unwrap(),
            priority: 1,
        };
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&message).unwrap()).unwrap();
        assert_eq!(value["order_type"], "takeout");
        assert_eq!(value["items"][0]["quantity"], 2);
        assert!(value.get("table_number").is_none());
        assert!(value.get("delivery_address").is_none());
    }

    #[test]
    fn status_message_round_trips() {
        let message = StatusMessage {
            order_number: "ORD_20260825_003".to_string(),
            old_status: OrderStatus::Received,
            new_status: OrderStatus::Cooking,
            changed_by: "chef-1".to_string(),
            timestamp: Utc::now(),
            estimated_completion: Some(Utc::now()),
        };
        let decoded: StatusMessage =
            serde_json::from_slice(&serde_json::to_vec(&message).unwrap()).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(decoded.new_status, OrderStatus::Cooking);
    }
}
