// ============================================================================
// Product Domain - Catalog of items an order can reference
// ============================================================================
//
// - Value objects (ProductCategory, ProductForm, Product)
// - Errors (ProductError)
// - Service (ProductService: validation on top of a ProductCatalog)
//
// ============================================================================

pub mod errors;
pub mod service;
pub mod value_objects;

pub use errors::*;
pub use service::*;
pub use value_objects::*;
