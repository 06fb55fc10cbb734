// ============================================================================
// Order Domain - Admission and lifecycle of restaurant orders
// ============================================================================
//
// - Value objects (OrderStatus, DayKey, Transition, NewOrder, ...)
// - Read model (OrderView)
// - Errors (OrderError)
// - Guards (one precondition check per status transition)
// - Ticket sequencer (daily ticket numbers)
// - Sorting (display priority for listings)
// - Service (OrderLifecycleService)
//
// ============================================================================

pub mod errors;
pub mod guards;
pub mod service;
pub mod sorting;
pub mod ticket;
pub mod value_objects;
pub mod view;

// Re-export for convenience
pub use errors::*;
pub use guards::*;
pub use service::*;
pub use sorting::*;
pub use ticket::*;
pub use value_objects::*;
pub use view::*;
