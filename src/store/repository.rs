use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::event_info::{EventInfo, EventStatus};
use crate::domain::registration::{Registration, RegistrationStatus};
use crate::outbox::{EventEnvelope, LifecycleEvent};

// ============================================================================
// Store Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the commit (e.g. concurrent duplicate registration)
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The stored document moved past the version this unit was built from
    #[error("Concurrency conflict on {entity} {id}: expected version {expected}")]
    Conflict {
        entity: &'static str,
        id: Uuid,
        expected: i64,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Storage backend failure: {0}")]
    Backend(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

// ============================================================================
// Queries
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationFilter {
    pub event_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    /// Only registrations for events owned by this organization
    pub organization_id: Option<Uuid>,
    /// Empty means any status
    pub statuses: Vec<RegistrationStatus>,
}

impl RegistrationFilter {
    pub fn for_event(event_id: Uuid) -> Self {
        Self {
            event_id: Some(event_id),
            ..Self::default()
        }
    }

    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    /// Check a registration against every field except `organization_id`,
    /// which needs the owning event
    pub fn matches(&self, registration: &Registration) -> bool {
        self.event_id.map_or(true, |id| registration.event_id == id)
            && self.user_id.map_or(true, |id| registration.user_id == id)
            && (self.statuses.is_empty() || self.statuses.contains(&registration.status()))
    }
}

// ============================================================================
// Unit of Work - everything one operation commits together
// ============================================================================
//
// Saved documents carry the version they were loaded at. `commit` rejects
// the whole unit with `StoreError::Conflict` when any of them has moved on
// since, and stores each accepted document at the next version.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct UnitOfWork {
    correlation_id: Uuid,
    actor: Option<Uuid>,
    events: Vec<EventInfo>,
    event_statuses: Vec<(Uuid, EventStatus)>,
    registrations: Vec<Registration>,
    outbox: Vec<EventEnvelope<LifecycleEvent>>,
}

impl UnitOfWork {
    pub fn new(actor: Option<Uuid>) -> Self {
        Self {
            correlation_id: Uuid::now_v7(),
            actor,
            events: Vec::new(),
            event_statuses: Vec::new(),
            registrations: Vec::new(),
            outbox: Vec::new(),
        }
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Upsert an event; a later save of the same id replaces the earlier one
    pub fn save_event(&mut self, event: EventInfo) {
        self.events.retain(|e| e.id != event.id);
        self.events.push(event);
    }

    /// Change only the event's status, leaving the rest of the stored
    /// document as it is at commit time
    pub fn set_event_status(&mut self, event_id: Uuid, status: EventStatus) {
        self.event_statuses.retain(|(id, _)| *id != event_id);
        self.event_statuses.push((event_id, status));
    }

    /// Upsert a registration together with its owned orders
    pub fn save_registration(&mut self, registration: Registration) {
        self.registrations.retain(|r| r.id != registration.id);
        self.registrations.push(registration);
    }

    /// Queue an outbox event and return its event id
    pub fn record(&mut self, event: LifecycleEvent) -> Uuid {
        let envelope = EventEnvelope::wrap(event, self.correlation_id).with_user(self.actor);
        let event_id = envelope.event_id;
        self.outbox.push(envelope);
        event_id
    }

    /// Queue an outbox event caused by an earlier one in this unit
    pub fn record_caused_by(&mut self, event: LifecycleEvent, causation_id: Uuid) -> Uuid {
        let envelope = EventEnvelope::wrap(event, self.correlation_id)
            .with_user(self.actor)
            .with_causation(causation_id);
        let event_id = envelope.event_id;
        self.outbox.push(envelope);
        event_id
    }

    pub fn events(&self) -> &[EventInfo] {
        &self.events
    }

    pub fn event_statuses(&self) -> &[(Uuid, EventStatus)] {
        &self.event_statuses
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    pub fn outbox(&self) -> &[EventEnvelope<LifecycleEvent>] {
        &self.outbox
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
            && self.event_statuses.is_empty()
            && self.registrations.is_empty()
            && self.outbox.is_empty()
    }
}

// ============================================================================
// Registration Store
// ============================================================================

#[async_trait]
pub trait RegistrationStore: Send + Sync {
    async fn load_event(&self, event_id: Uuid) -> Result<Option<EventInfo>, StoreError>;

    async fn load_registration(
        &self,
        registration_id: Uuid,
    ) -> Result<Option<Registration>, StoreError>;

    /// The non-cancelled registration for (event, user), if any
    async fn find_active_registration(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Registration>, StoreError>;

    async fn find_registration_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Registration>, StoreError>;

    /// All registrations for the event, cancelled ones included
    async fn count_registrations(&self, event_id: Uuid) -> Result<usize, StoreError>;

    async fn list_registrations(
        &self,
        filter: &RegistrationFilter,
    ) -> Result<Vec<Registration>, StoreError>;

    /// Apply the whole unit atomically. A second non-cancelled registration
    /// for the same (event, user) fails with `StoreError::UniqueViolation`,
    /// a document saved from a stale version with `StoreError::Conflict`,
    /// and a status change for an unknown event with `StoreError::NotFound`.
    async fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_unit_of_work_upserts_by_id() {
        let mut unit = UnitOfWork::new(None);
        let mut event = EventInfo::new(Uuid::now_v7(), "Course");
        unit.save_event(event.clone());
        event.title = "Renamed".to_string();
        unit.save_event(event);

        assert_eq!(unit.events().len(), 1);
        assert_eq!(unit.events()[0].title, "Renamed");
    }

    #[test]
    fn test_recorded_events_share_correlation_and_actor() {
        let actor = Uuid::now_v7();
        let mut unit = UnitOfWork::new(Some(actor));
        unit.record(LifecycleEvent::RegistrationUpdated { registration_id: Uuid::now_v7() });
        unit.record(LifecycleEvent::RegistrationUpdated { registration_id: Uuid::now_v7() });

        assert!(unit
            .outbox()
            .iter()
            .all(|e| e.correlation_id == unit.correlation_id() && e.user_id == Some(actor)));
    }

    #[test]
    fn test_caused_events_point_at_their_cause() {
        let mut unit = UnitOfWork::new(None);
        let registration_id = Uuid::now_v7();
        let cause = unit.record(LifecycleEvent::RegistrationUpdated { registration_id });
        let effect = unit.record_caused_by(
            LifecycleEvent::RegistrationUpdated { registration_id },
            cause,
        );

        let outbox = unit.outbox();
        assert_eq!(outbox[0].event_id, cause);
        assert_eq!(outbox[0].causation_id, None);
        assert_eq!(outbox[1].event_id, effect);
        assert_eq!(outbox[1].causation_id, Some(cause));
    }

    #[test]
    fn test_event_status_change_replaces_earlier_one() {
        let mut unit = UnitOfWork::new(None);
        let event_id = Uuid::now_v7();
        unit.set_event_status(event_id, EventStatus::WaitingList);
        unit.set_event_status(event_id, EventStatus::RegistrationsClosed);

        assert_eq!(unit.event_statuses(), &[(event_id, EventStatus::RegistrationsClosed)]);
        assert!(!unit.is_empty());
    }

    #[test]
    fn test_filter_matches() {
        let reg = Registration::new(Uuid::now_v7(), Uuid::now_v7(), "A", "a@example.com", Utc::now());

        assert!(RegistrationFilter::default().matches(&reg));
        assert!(RegistrationFilter::for_event(reg.event_id).matches(&reg));
        assert!(!RegistrationFilter::for_user(Uuid::now_v7()).matches(&reg));

        let filter = RegistrationFilter {
            statuses: vec![RegistrationStatus::Cancelled],
            ..RegistrationFilter::default()
        };
        assert!(!filter.matches(&reg));
    }
}
