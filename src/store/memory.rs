use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repository::{RegistrationFilter, RegistrationStore, StoreError, UnitOfWork};
use crate::domain::event_info::EventInfo;
use crate::domain::registration::Registration;
use crate::outbox::{EventEnvelope, LifecycleEvent};

// ============================================================================
// In-Memory Store
// ============================================================================
//
// Commits take the write lock once and apply the unit without awaiting, so
// a commit is all-or-nothing and never observed half-applied. Reads between
// commits are not serialized, the same as a relational store at READ
// COMMITTED. Every accepted event or registration is stored at its loaded
// version plus one, and a unit saving a stale copy is rejected whole.
//
// ============================================================================

#[derive(Debug, Default)]
struct State {
    events: HashMap<Uuid, EventInfo>,
    registrations: HashMap<Uuid, Registration>,
    outbox: Vec<EventEnvelope<LifecycleEvent>>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an event outside of any service operation
    pub async fn seed_event(&self, mut event: EventInfo) {
        let mut state = self.state.write().await;
        let version = state.events.get(&event.id).map_or(0, EventInfo::version);
        event.set_version(version + 1);
        state.events.insert(event.id, event);
    }

    pub async fn outbox(&self) -> Vec<EventEnvelope<LifecycleEvent>> {
        self.state.read().await.outbox.clone()
    }

    pub async fn registration_count(&self) -> usize {
        self.state.read().await.registrations.len()
    }

    fn check_versions(state: &State, unit: &UnitOfWork) -> Result<(), StoreError> {
        for event in unit.events() {
            let current = state.events.get(&event.id).map_or(0, EventInfo::version);
            if current != event.version() {
                return Err(StoreError::Conflict {
                    entity: "Event",
                    id: event.id,
                    expected: event.version(),
                });
            }
        }

        for (event_id, _) in unit.event_statuses() {
            let saved_in_unit = unit.events().iter().any(|e| e.id == *event_id);
            if !saved_in_unit && !state.events.contains_key(event_id) {
                return Err(StoreError::NotFound {
                    entity: "Event",
                    id: *event_id,
                });
            }
        }

        for registration in unit.registrations() {
            let current = state
                .registrations
                .get(&registration.id)
                .map_or(0, Registration::version);
            if current != registration.version() {
                return Err(StoreError::Conflict {
                    entity: "Registration",
                    id: registration.id,
                    expected: registration.version(),
                });
            }
        }
        Ok(())
    }

    fn check_unique(state: &State, unit: &UnitOfWork) -> Result<(), StoreError> {
        let incoming = unit.registrations().iter().filter(|r| !r.is_cancelled());

        for (index, registration) in incoming.clone().enumerate() {
            let clash_in_unit = incoming
                .clone()
                .skip(index + 1)
                .any(|other| other.event_id == registration.event_id && other.user_id == registration.user_id);

            let clash_in_store = state.registrations.values().any(|existing| {
                existing.id != registration.id
                    && !existing.is_cancelled()
                    && existing.event_id == registration.event_id
                    && existing.user_id == registration.user_id
                    // a row being cancelled in this same unit no longer clashes
                    && !unit
                        .registrations()
                        .iter()
                        .any(|r| r.id == existing.id && r.is_cancelled())
            });

            if clash_in_unit || clash_in_store {
                return Err(StoreError::UniqueViolation(format!(
                    "registration for event {} and user {} already exists",
                    registration.event_id, registration.user_id
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RegistrationStore for InMemoryStore {
    async fn load_event(&self, event_id: Uuid) -> Result<Option<EventInfo>, StoreError> {
        Ok(self.state.read().await.events.get(&event_id).cloned())
    }

    async fn load_registration(
        &self,
        registration_id: Uuid,
    ) -> Result<Option<Registration>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .registrations
            .get(&registration_id)
            .cloned())
    }

    async fn find_active_registration(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Registration>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .registrations
            .values()
            .find(|r| r.event_id == event_id && r.user_id == user_id && !r.is_cancelled())
            .cloned())
    }

    async fn find_registration_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Registration>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .registrations
            .values()
            .find(|r| r.order(order_id).is_some())
            .cloned())
    }

    async fn count_registrations(&self, event_id: Uuid) -> Result<usize, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .registrations
            .values()
            .filter(|r| r.event_id == event_id)
            .count())
    }

    async fn list_registrations(
        &self,
        filter: &RegistrationFilter,
    ) -> Result<Vec<Registration>, StoreError> {
        let state = self.state.read().await;
        let mut found: Vec<Registration> = state
            .registrations
            .values()
            .filter(|r| filter.matches(r))
            .filter(|r| {
                filter.organization_id.map_or(true, |org| {
                    state
                        .events
                        .get(&r.event_id)
                        .is_some_and(|e| e.organization_id == org)
                })
            })
            .cloned()
            .collect();
        found.sort_by_key(|r| r.id);
        Ok(found)
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        Self::check_unique(&state, &unit)?;
        Self::check_versions(&state, &unit)?;

        for event in unit.events() {
            let mut stored = event.clone();
            stored.set_version(event.version() + 1);
            state.events.insert(stored.id, stored);
        }
        for (event_id, status) in unit.event_statuses() {
            if let Some(stored) = state.events.get_mut(event_id) {
                stored.status = *status;
                stored.set_version(stored.version() + 1);
            }
        }
        for registration in unit.registrations() {
            let mut stored = registration.clone();
            stored.set_version(registration.version() + 1);
            state.registrations.insert(stored.id, stored);
        }
        state.outbox.extend(unit.outbox().iter().cloned());

        tracing::debug!(
            correlation_id = %unit.correlation_id(),
            events = unit.events().len(),
            registrations = unit.registrations().len(),
            outbox = unit.outbox().len(),
            "Committed unit of work"
        );
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
