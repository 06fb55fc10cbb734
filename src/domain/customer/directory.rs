use async_trait::async_trait;

use super::errors::CustomerLookupError;
use super::value_objects::Customer;

/// Display-name lookup keyed by national ID (CPF).
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn lookup_by_national_id(&self, national_id: &str) -> Result<Customer, CustomerLookupError>;
}
