// ============================================================================
// Customer Domain - Read-only view of the external customer directory
// ============================================================================
//
// - Value objects (Customer, NationalId)
// - Errors (CustomerLookupError)
// - Directory (CustomerDirectory trait; HTTP client lives in remote/)
//
// ============================================================================

pub mod directory;
pub mod errors;
pub mod value_objects;

pub use directory::*;
pub use errors::*;
pub use value_objects::*;
