use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

use super::value_objects::ProductId;
use crate::store::StoreError;

// ============================================================================
// Product Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ProductError {
    #[error("Product {0} not found")]
    NotFound(ProductId),

    #[error("Invalid product: {0}")]
    InvalidProduct(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProductError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProductError::NotFound(_) => StatusCode::NOT_FOUND,
            ProductError::InvalidProduct(_) => StatusCode::BAD_REQUEST,
            ProductError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            ProductError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ResponseError for ProductError {
    fn status_code(&self) -> StatusCode {
        ProductError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = ProductError::status_code(self);
        HttpResponse::build(status).json(json!({
            "statusCode": status.as_u16(),
            "message": self.to_string(),
        }))
    }
}
