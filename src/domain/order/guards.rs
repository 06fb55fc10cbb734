use std::fmt;
use std::sync::Arc;

use super::errors::OrderError;
use super::value_objects::{OrderId, OrderStatus};
use crate::store::OrderStore;

// ============================================================================
// Status Guards
// ============================================================================
//
// One guard per transition. A guard only reads: it loads the order and checks
// that it currently sits in the status the transition starts from.
//
//   ToPreparing       Created   -> Preparing
//   ToDone            Preparing -> Done
//   ToDeliveredOrNot  Done      -> Delivered | NotDelivered
//   ToPaid            Paying    -> Created
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardKind {
    ToPreparing,
    ToDone,
    ToDeliveredOrNot,
    ToPaid,
}

impl GuardKind {
    pub fn required(&self) -> OrderStatus {
        match self {
            GuardKind::ToPreparing => OrderStatus::Created,
            GuardKind::ToDone => OrderStatus::Preparing,
            GuardKind::ToDeliveredOrNot => OrderStatus::Done,
            GuardKind::ToPaid => OrderStatus::Paying,
        }
    }

    /// Pure status check, independent of storage.
    pub fn check(&self, order_id: OrderId, actual: OrderStatus) -> Result<(), OrderError> {
        let required = self.required();
        if actual == required {
            Ok(())
        } else {
            Err(OrderError::PreconditionFailed {
                order_id,
                required,
                actual,
            })
        }
    }
}

impl fmt::Display for GuardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GuardKind::ToPreparing => "to_preparing",
            GuardKind::ToDone => "to_done",
            GuardKind::ToDeliveredOrNot => "to_delivered_or_not",
            GuardKind::ToPaid => "to_paid",
        };
        f.write_str(name)
    }
}

pub struct OrderStatusGuard {
    kind: GuardKind,
    store: Arc<dyn OrderStore>,
}

impl OrderStatusGuard {
    pub fn new(kind: GuardKind, store: Arc<dyn OrderStore>) -> Self {
        Self { kind, store }
    }

    pub fn kind(&self) -> GuardKind {
        self.kind
    }

    pub fn required(&self) -> OrderStatus {
        self.kind.required()
    }

    /// Returns the order's current status when it satisfies the guard.
    pub async fn validate(&self, order_id: OrderId) -> Result<OrderStatus, OrderError> {
        let order = self
            .store
            .get_by_id(order_id)
            .await?
            .ok_or(OrderError::NotFound { order_id })?;

        self.kind.check(order_id, order.order_status)?;
        Ok(order.order_status)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
