// ============================================================================
// Registration Domain - A user's enrollment in one event
// ============================================================================
//
// - Value objects (RegistrationStatus, RegistrationType)
// - Errors (RegistrationError)
// - Aggregate (Registration, owner of its orders)
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod aggregate;

pub use value_objects::*;
pub use errors::*;
pub use aggregate::*;
