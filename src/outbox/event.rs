use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ============================================================================
// Event Envelope - metadata around a lifecycle event
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventEnvelope<E> {
    // Event Identity
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub aggregate_type: String,

    // Event Type Information
    pub event_type: String,
    pub event_version: i32,

    // Event Payload
    pub event_data: E,

    // Causation & Correlation
    pub causation_id: Option<Uuid>,
    pub correlation_id: Uuid,

    // Who triggered this event
    pub user_id: Option<Uuid>,

    pub timestamp: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

impl<E: DomainEvent> EventEnvelope<E> {
    pub fn wrap(event_data: E, correlation_id: Uuid) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            aggregate_id: event_data.aggregate_id(),
            aggregate_type: event_data.aggregate_type().to_string(),
            event_type: event_data.event_type().to_string(),
            event_version: E::event_version(),
            event_data,
            causation_id: None,
            correlation_id,
            user_id: None,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }
}

impl<E> EventEnvelope<E> {
    pub fn with_user(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_causation(mut self, causation_id: Uuid) -> Self {
        self.causation_id = Some(causation_id);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Domain Event Trait
// ============================================================================

pub trait DomainEvent: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync {
    fn event_type(&self) -> &'static str;
    fn aggregate_type(&self) -> &'static str;
    fn aggregate_id(&self) -> Uuid;
    fn event_version() -> i32
    where
        Self: Sized,
    {
        1
    }
}

pub fn serialize_event<E: Serialize>(event: &E) -> Result<String> {
    Ok(serde_json::to_string(event)?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    struct TestEvent {
        id: Uuid,
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            "TestEvent"
        }
        fn aggregate_type(&self) -> &'static str {
            "Test"
        }
        fn aggregate_id(&self) -> Uuid {
            self.id
        }
    }

    #[test]
    fn test_wrap_copies_identity_from_event() {
        let id = Uuid::now_v7();
        let correlation_id = Uuid::now_v7();
        let user = Uuid::now_v7();

        let envelope = EventEnvelope::wrap(TestEvent { id }, correlation_id)
            .with_user(Some(user))
            .with_metadata("source", "test");

        assert_eq!(envelope.aggregate_id, id);
        assert_eq!(envelope.aggregate_type, "Test");
        assert_eq!(envelope.event_type, "TestEvent");
        assert_eq!(envelope.event_version, 1);
        assert_eq!(envelope.correlation_id, correlation_id);
        assert_eq!(envelope.user_id, Some(user));
        assert_eq!(envelope.metadata.get("source").map(String::as_str), Some("test"));
    }

    #[test]
    fn test_envelope_serialization() {
        let envelope = EventEnvelope::wrap(TestEvent { id: Uuid::now_v7() }, Uuid::now_v7());
        let json = serialize_event(&envelope).unwrap();
        let back: EventEnvelope<TestEvent> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, envelope);
    }
}
