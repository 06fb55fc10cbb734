// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each area has its own subdirectory with value objects, errors and the
// service or contract that drives it. Storage and network access happen only
// through the traits in `store` and `customer::CustomerDirectory`.
//
// ============================================================================

pub mod customer;
pub mod order;
pub mod product;
