// ============================================================================
// Catalog Domain - Products and Variants sold for an event
// ============================================================================

pub mod value_objects;

pub use value_objects::*;
