// ============================================================================
// Persistence Contracts
// ============================================================================
//
// The lifecycle service talks to storage only through these traits:
// - OrderStore      - orders, line items and the per-day ticket counter
// - ProductCatalog  - products and combos
//
// Implementations:
// - postgres   - sqlx / PostgreSQL, multi-row writes in one transaction
// - in_memory  - process-local maps for tests and the local demo
//
// ============================================================================

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryOrderStore, InMemoryProductCatalog};
pub use postgres::{PgOrderStore, PgProductCatalog};

use async_trait::async_trait;

use crate::domain::order::{
    DayCounter, DayKey, NewOrder, OrderCreated, OrderId, OrderStatus, OrderView, StatusChange,
    Ticket,
};
use crate::domain::product::{Product, ProductCategory, ProductForm, ProductId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Failures worth retrying without changing the request.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::Database(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            _ => false,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() || db_err.is_foreign_key_violation() {
                return StoreError::Conflict(db_err.message().to_string());
            }
        }
        StoreError::Database(err)
    }
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists the order row and its line items atomically.
    async fn create_order(
        &self,
        order: &NewOrder,
        status: OrderStatus,
        ticket: Ticket,
    ) -> Result<OrderCreated, StoreError>;

    /// Compare-and-set status write. Returns false when no row matched.
    async fn update_status(&self, order_id: OrderId, change: StatusChange) -> Result<bool, StoreError>;

    /// Moves a `Paying` order to `Created` and records the payment reference.
    async fn confirm_payment(&self, order_id: OrderId, payment_id: &str) -> Result<bool, StoreError>;

    async fn get_by_id(&self, order_id: OrderId) -> Result<Option<OrderView>, StoreError>;

    /// Orders in any of `statuses`, oldest first.
    async fn list_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<OrderView>, StoreError>;

    async fn get_or_create_day_counter(&self, day: DayKey) -> Result<DayCounter, StoreError>;

    async fn increment_day_counter(&self, day: DayKey) -> Result<i32, StoreError>;

    /// Removes the order and its line items. Returns false when absent.
    async fn delete_order(&self, order_id: OrderId) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// IDs from `ids` with no matching product, in input order.
    async fn find_missing(&self, ids: &[ProductId]) -> Result<Vec<ProductId>, StoreError>;

    async fn create_product(&self, form: &ProductForm) -> Result<ProductId, StoreError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn list_by_category(&self, category: ProductCategory) -> Result<Vec<Product>, StoreError>;

    async fn update_product(&self, id: ProductId, form: &ProductForm) -> Result<bool, StoreError>;

    async fn delete_product(&self, id: ProductId) -> Result<bool, StoreError>;
}
