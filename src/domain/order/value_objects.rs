use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;

// ============================================================================
// Order Value Objects
// ============================================================================

pub type OrderId = i64;

/// Lifecycle status. The serialized literals are the ones persisted in the
/// `orders.order_status` column and emitted to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "Criado")]
    Created,
    #[serde(rename = "Pagando")]
    Paying,
    #[serde(rename = "Preparando")]
    Preparing,
    #[serde(rename = "Finalizado")]
    Done,
    #[serde(rename = "Entregue")]
    Delivered,
    #[serde(rename = "Nao entregue")]
    NotDelivered,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Created,
        OrderStatus::Paying,
        OrderStatus::Preparing,
        OrderStatus::Done,
        OrderStatus::Delivered,
        OrderStatus::NotDelivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "Criado",
            OrderStatus::Paying => "Pagando",
            OrderStatus::Preparing => "Preparando",
            OrderStatus::Done => "Finalizado",
            OrderStatus::Delivered => "Entregue",
            OrderStatus::NotDelivered => "Nao entregue",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::NotDelivered)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown order status: {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Status an order is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialStatus {
    /// Payment already settled, goes straight to the kitchen queue.
    Direct,
    /// Awaiting payment confirmation.
    Paying,
}

impl InitialStatus {
    pub fn status(&self) -> OrderStatus {
        match self {
            InitialStatus::Direct => OrderStatus::Created,
            InitialStatus::Paying => OrderStatus::Paying,
        }
    }
}

// ============================================================================
// Ticket Day Key
// ============================================================================

/// Calendar day a ticket counter is keyed on.
///
/// Always derived from a timestamp expressed in the timezone tickets should
/// roll over in, so every instant of the same local day maps to the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn from_datetime<Tz: TimeZone>(at: &DateTime<Tz>) -> Self {
        DayKey(at.date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A ticket number together with the day it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub day: DayKey,
    pub number: i32,
}

/// Counter row as seen by the sequencer. `created` is true when this call
/// inserted the row (and `value` is therefore 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCounter {
    pub value: i32,
    pub created: bool,
}

// ============================================================================
// Transitions
// ============================================================================

/// Per-transition timestamp column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampField {
    PreparingAt,
    DoneAt,
    DeliveredAt,
    NotDeliveredAt,
}

impl StampField {
    pub fn column(&self) -> &'static str {
        match self {
            StampField::PreparingAt => "preparing_at",
            StampField::DoneAt => "done_at",
            StampField::DeliveredAt => "delivered_at",
            StampField::NotDeliveredAt => "not_delivered_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    StartPreparing,
    Finish,
    Deliver,
    MarkNotDelivered,
}

impl Transition {
    pub fn required(&self) -> OrderStatus {
        match self {
            Transition::StartPreparing => OrderStatus::Created,
            Transition::Finish => OrderStatus::Preparing,
            Transition::Deliver | Transition::MarkNotDelivered => OrderStatus::Done,
        }
    }

    pub fn target(&self) -> OrderStatus {
        match self {
            Transition::StartPreparing => OrderStatus::Preparing,
            Transition::Finish => OrderStatus::Done,
            Transition::Deliver => OrderStatus::Delivered,
            Transition::MarkNotDelivered => OrderStatus::NotDelivered,
        }
    }

    pub fn stamp(&self) -> StampField {
        match self {
            Transition::StartPreparing => StampField::PreparingAt,
            Transition::Finish => StampField::DoneAt,
            Transition::Deliver => StampField::DeliveredAt,
            Transition::MarkNotDelivered => StampField::NotDeliveredAt,
        }
    }

    pub fn change_at(&self, at: DateTime<Utc>) -> StatusChange {
        StatusChange {
            from: self.required(),
            to: self.target(),
            stamp: self.stamp(),
            at,
        }
    }
}

/// Compare-and-set status write: applies only while the order is still in
/// `from` and `stamp` has never been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub stamp: StampField,
    pub at: DateTime<Utc>,
}

// ============================================================================
// Order Input
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
}

/// Order as submitted by a client. Repeated lines express quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub total_price: f64,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default, rename = "cpf")]
    pub national_id: Option<String>,
    pub order_product: Vec<OrderLine>,
}

impl NewOrder {
    pub fn new(total_price: f64, product_ids: impl IntoIterator<Item = ProductId>) -> Self {
        Self {
            total_price,
            payment_id: None,
            national_id: None,
            order_product: product_ids
                .into_iter()
                .map(|product_id| OrderLine { product_id })
                .collect(),
        }
    }

    pub fn with_national_id(mut self, national_id: impl Into<String>) -> Self {
        self.national_id = Some(national_id.into());
        self
    }

    pub fn with_payment_id(mut self, payment_id: impl Into<String>) -> Self {
        self.payment_id = Some(payment_id.into());
        self
    }

    /// Distinct product IDs referenced, in first-seen order.
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = Vec::with_capacity(self.order_product.len());
        for line in &self.order_product {
            if !ids.contains(&line.product_id) {
                ids.push(line.product_id);
            }
        }
        ids
    }
}

/// What the store hands back after persisting a new order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderCreated {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    pub ticket_number: i32,
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate};

    #[test]
    fn test_status_wire_literals() {
        let json = serde_json::to_string(&OrderStatus::NotDelivered).unwrap();
        assert_eq!(json, "\"Nao entregue\"");

        let parsed: OrderStatus = serde_json::from_str("\"Preparando\"").unwrap();
        assert_eq!(parsed, OrderStatus::Preparing);
    }

    #[test]
    fn test_status_from_str_matches_serde() {
        for status in OrderStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json.trim_matches('"'), status.as_str());
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("Shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_day_key_uses_local_date_of_timestamp() {
        let tz = FixedOffset::west_opt(3 * 3600).unwrap();
        // 01:30 UTC on the 2nd is still the 1st at UTC-3.
        let late_night = tz.with_ymd_and_hms(2024, 3, 1, 22, 30, 0).unwrap();
        let morning = tz.with_ymd_and_hms(2024, 3, 1, 0, 5, 0).unwrap();

        assert_eq!(DayKey::from_datetime(&late_night), DayKey::from_datetime(&morning));
        assert_eq!(
            DayKey::from_datetime(&late_night).date(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert_ne!(
            DayKey::from_datetime(&late_night),
            DayKey::from_datetime(&late_night.with_timezone(&Utc))
        );
    }

    #[test]
    fn test_transition_table() {
        assert_eq!(Transition::StartPreparing.required(), OrderStatus::Created);
        assert_eq!(Transition::Finish.required(), OrderStatus::Preparing);
        assert_eq!(Transition::Deliver.required(), OrderStatus::Done);
        assert_eq!(Transition::MarkNotDelivered.required(), OrderStatus::Done);
        assert_eq!(Transition::MarkNotDelivered.target(), OrderStatus::NotDelivered);
        assert_eq!(Transition::Finish.stamp().column(), "done_at");
    }

    #[test]
    fn test_new_order_deserializes_client_payload() {
        let payload = r#"{
            "totalPrice": 42.5,
            "cpf": "12345678900",
            "orderProduct": [{"productId": 3}, {"productId": 3}, {"productId": 7}]
        }"#;
        let order: NewOrder = serde_json::from_str(payload).unwrap();

        assert_eq!(order.national_id.as_deref(), Some("12345678900"));
        assert_eq!(order.payment_id, None);
        assert_eq!(order.order_product.len(), 3);
        assert_eq!(order.product_ids(), vec![3, 7]);
    }
}
