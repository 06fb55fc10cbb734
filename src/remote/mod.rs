// ============================================================================
// Outbound Clients
// ============================================================================

pub mod customer;

pub use customer::HttpCustomerDirectory;
