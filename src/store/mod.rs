// ============================================================================
// Store - persistence collaborator
// ============================================================================
//
// Services load aggregates, mutate them in memory, collect the result in a
// `UnitOfWork` and hand it to `RegistrationStore::commit`, which applies the
// whole unit atomically or not at all.
//
// ============================================================================

mod memory;
mod postgres;
mod repository;
mod users;

pub use memory::InMemoryStore;
pub use postgres::PgStore;
pub use repository::{RegistrationFilter, RegistrationStore, StoreError, UnitOfWork};
pub use users::{InMemoryUserDirectory, UserDirectory, UserProfile};
