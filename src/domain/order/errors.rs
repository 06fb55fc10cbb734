use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

use super::value_objects::{OrderId, OrderStatus};
use crate::admission::AdmissionError;
use crate::domain::product::ProductId;
use crate::store::StoreError;

// ============================================================================
// Order Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order {order_id} not found")]
    NotFound { order_id: OrderId },

    #[error("Products not found: {0:?}")]
    UnknownProducts(Vec<ProductId>),

    #[error("Order must contain at least one product")]
    EmptyOrder,

    #[error("Order {order_id} must be in status {required} (current: {actual})")]
    PreconditionFailed {
        order_id: OrderId,
        required: OrderStatus,
        actual: OrderStatus,
    },

    #[error("Timed out after {0:?} waiting for order admission")]
    AdmissionTimeout(Duration),

    #[error("Order creation cancelled while waiting for admission")]
    AdmissionCancelled,

    #[error("Could not allocate a ticket number: {0}")]
    TicketAllocation(#[source] StoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OrderError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            OrderError::NotFound { .. } | OrderError::UnknownProducts(_) => StatusCode::NOT_FOUND,
            OrderError::EmptyOrder => StatusCode::BAD_REQUEST,
            OrderError::PreconditionFailed { .. } => StatusCode::PRECONDITION_REQUIRED,
            OrderError::AdmissionTimeout(_) | OrderError::AdmissionCancelled => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            OrderError::TicketAllocation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            OrderError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            OrderError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the same request may succeed if simply sent again.
    pub fn is_retryable(&self) -> bool {
        match self {
            OrderError::AdmissionTimeout(_) => true,
            OrderError::TicketAllocation(e) | OrderError::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<AdmissionError> for OrderError {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::TimedOut(waited) => OrderError::AdmissionTimeout(waited),
            AdmissionError::Cancelled => OrderError::AdmissionCancelled,
        }
    }
}

impl ResponseError for OrderError {
    fn status_code(&self) -> StatusCode {
        OrderError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = OrderError::status_code(self);
        HttpResponse::build(status).json(json!({
            "statusCode": status.as_u16(),
            "message": self.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            OrderError::NotFound { order_id: 1 }.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            OrderError::UnknownProducts(vec![9]).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(OrderError::EmptyOrder.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            OrderError::PreconditionFailed {
                order_id: 1,
                required: OrderStatus::Created,
                actual: OrderStatus::Preparing,
            }
            .status_code()
            .as_u16(),
            428
        );
        assert_eq!(
            OrderError::AdmissionTimeout(Duration::from_secs(5)).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            OrderError::Store(StoreError::Conflict("dup".into())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            OrderError::TicketAllocation(StoreError::Unavailable("down".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_retryable() {
        assert!(OrderError::AdmissionTimeout(Duration::from_millis(10)).is_retryable());
        assert!(!OrderError::AdmissionCancelled.is_retryable());
        assert!(!OrderError::EmptyOrder.is_retryable());
        assert!(OrderError::TicketAllocation(StoreError::Unavailable("down".into())).is_retryable());
        assert!(!OrderError::Store(StoreError::Corrupt("bad".into())).is_retryable());
    }

    #[test]
    fn test_precondition_message_names_both_statuses() {
        let err = OrderError::PreconditionFailed {
            order_id: 7,
            required: OrderStatus::Done,
            actual: OrderStatus::Preparing,
        };
        assert_eq!(
            err.to_string(),
            "Order 7 must be in status Finalizado (current: Preparando)"
        );
    }

    #[test]
    fn test_error_response_body() {
        let response = OrderError::EmptyOrder.error_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
