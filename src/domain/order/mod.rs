// ============================================================================
// Order Domain - Business Logic for the Order Aggregate
// ============================================================================
//
// - Value objects (OrderStatus, OrderLine, CustomerSnapshot, PaymentMethod)
// - Errors (OrderError)
// - Aggregate (Order with its status machine)
// - Commands (ProductRequest, typestate OrderUpdates builder)
// - Composition (basket → order-line additions and refunds)
//
// ============================================================================

pub mod value_objects;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod composition;

// Re-export for convenience
pub use value_objects::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use composition::{compose_order, mandatory_basket, CompositionOutcome};
