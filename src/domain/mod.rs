// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each aggregate has its own subdirectory with:
// - Value objects
// - Errors
// - Aggregate implementation
// - Commands (where callers express intent)
//
// This layer performs no I/O. Services in `crate::services` load state from
// the store, run these rules against in-memory objects and commit the result.
//
// ============================================================================

pub mod catalog;
pub mod event_info;
pub mod order;
pub mod principal;
pub mod registration;
