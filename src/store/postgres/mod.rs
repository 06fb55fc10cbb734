// ============================================================================
// PostgreSQL Stores (sqlx)
// ============================================================================
//
// Schema lives in `migrations/` and is applied on connect. Multi-row writes
// (order + line items, product + images + combo members) run in a single
// transaction; a dropped transaction rolls back.
//
// ============================================================================

mod orders;
mod products;

pub use orders::PgOrderStore;
pub use products::PgProductCatalog;

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use super::StoreError;

/// Opens a pool and brings the schema up to date.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| StoreError::Unavailable(format!("migrations failed: {e}")))?;

    tracing::info!(max_connections, "✅ Connected to PostgreSQL, schema up to date");
    Ok(pool)
}
