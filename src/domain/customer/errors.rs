// ============================================================================
// Customer Lookup Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CustomerLookupError {
    #[error("Customer not found")]
    NotFound,

    #[error("Customer directory request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Customer directory circuit is open")]
    CircuitOpen,

    #[error("Customer directory answered with status {0}")]
    Status(u16),
}
