// ============================================================================
// Order Ticketing - Restaurant order admission & lifecycle
// ============================================================================
//
// Layout:
// - domain/     - Order, product and customer business rules
// - store/      - Persistence contracts + Postgres / in-memory implementations
// - remote/     - Outbound clients (customer directory)
// - admission   - Capacity-one gate serialising ticket issuance
// - metrics/    - Prometheus registry and scrape server
// - utils/      - Circuit breaker
//
// ============================================================================

pub mod admission;
pub mod clock;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod remote;
pub mod store;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;
