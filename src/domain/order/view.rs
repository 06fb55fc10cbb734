use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::{NewOrder, OrderCreated, OrderId, OrderStatus};
use crate::domain::product::ProductId;

// ============================================================================
// Order Read Model
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderProductView {
    pub product_id: ProductId,
    pub product_name: Option<String>,
    pub description: Option<String>,
}

/// Order as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub order_id: OrderId,
    pub order_date: DateTime<Utc>,
    pub ticket_number: i32,
    pub order_status: OrderStatus,
    pub preparing_at: Option<DateTime<Utc>>,
    pub done_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub not_delivered_at: Option<DateTime<Utc>>,
    pub total_price: f64,
    pub payment_id: Option<String>,
    /// Only used to resolve `customer_name`; never emitted.
    #[serde(skip)]
    pub national_id: Option<String>,
    pub order_product: Vec<OrderProductView>,
    pub customer_name: Option<String>,
}

impl OrderView {
    /// View of an order that was just admitted. Product names are not
    /// resolved here; reads through the store fill them in.
    pub fn admitted(created: OrderCreated, order: &NewOrder, status: OrderStatus) -> Self {
        Self {
            order_id: created.id,
            order_date: created.created_at,
            ticket_number: created.ticket_number,
            order_status: status,
            preparing_at: None,
            done_at: None,
            delivered_at: None,
            not_delivered_at: None,
            total_price: order.total_price,
            payment_id: order.payment_id.clone(),
            national_id: order.national_id.clone(),
            order_product: order
                .order_product
                .iter()
                .map(|line| OrderProductView {
                    product_id: line.product_id,
                    product_name: None,
                    description: None,
                })
                .collect(),
            customer_name: None,
        }
    }
}
