// ============================================================================
// Event Registration - order and registration lifecycle engine
// ============================================================================
//
// - domain:   events, products, registrations and their orders
// - services: registration lifecycle, order management, policy gate
// - store:    atomic persistence (in-memory and Postgres) with an outbox
// - outbox:   lifecycle events for invoicing and notification consumers
//
// ============================================================================

pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod metrics;
pub mod outbox;
pub mod services;
pub mod store;
