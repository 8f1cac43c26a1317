// ============================================================================
// Event Domain - Events users register for
// ============================================================================
//
// Owned by the event-management collaborator. The only mutation this core
// performs is the capacity flip to `WaitingList`.
//
// ============================================================================

pub mod value_objects;

pub use value_objects::*;
