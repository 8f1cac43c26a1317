// ============================================================================
// Outbox - lifecycle events committed with the entities they describe
// ============================================================================
//
// Invoicing, certificate and notification collaborators key off these
// transitions. Envelopes are written in the same commit as the state change,
// so a consumer never sees an event for a change that was rolled back.
//
// ============================================================================

mod event;
mod lifecycle;

pub use event::{serialize_event, DomainEvent, EventEnvelope};
pub use lifecycle::LifecycleEvent;
