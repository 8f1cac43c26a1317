use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::catalog::Product;

// ============================================================================
// Event Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Draft,
    Planned,
    RegistrationsOpen,
    WaitingList,
    RegistrationsClosed,
    Finished,
    Cancelled,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Rules for how long a participant may edit their own registration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrationPolicy {
    pub allowed_registration_edit_hours: Option<u32>,
    pub allow_modifications_after_last_cancellation_date: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInfo {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub title: String,
    pub status: EventStatus,
    /// 0 means unlimited
    pub max_participants: u32,
    pub last_cancellation_date: Option<DateTime<Utc>>,
    pub policy: RegistrationPolicy,
    pub products: Vec<Product>,

    /// Store version this copy was loaded at; 0 until first committed
    #[serde(skip)]
    version: i64,
}

impl EventInfo {
    pub fn new(organization_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            organization_id,
            title: title.into(),
            status: EventStatus::RegistrationsOpen,
            max_participants: 0,
            last_cancellation_date: None,
            policy: RegistrationPolicy::default(),
            products: Vec::new(),
            version: 0,
        }
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    pub fn accepts_registrations(&self) -> bool {
        matches!(
            self.status,
            EventStatus::RegistrationsOpen | EventStatus::WaitingList
        )
    }

    pub fn product(&self, product_id: Uuid) -> Option<&Product> {
        self.products.iter().find(|p| p.id == product_id)
    }

    pub fn mandatory_products(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|p| p.is_mandatory())
    }

    pub fn has_capacity_limit(&self) -> bool {
        self.max_participants > 0
    }

    /// True once `registration_count` (including the one being added) fills the event
    pub fn is_full_with(&self, registration_count: usize) -> bool {
        self.has_capacity_limit() && registration_count >= self.max_participants as usize
    }

    /// Add a product, re-scoping it to this event
    pub fn add_product(&mut self, mut product: Product) -> Uuid {
        product.event_id = self.id;
        let id = product.id;
        self.products.push(product);
        id
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_open_and_waiting_list_accept_registrations() {
        let mut event = EventInfo::new(Uuid::now_v7(), "Annual conference");
        assert!(event.accepts_registrations());

        event.status = EventStatus::WaitingList;
        assert!(event.accepts_registrations());

        for status in [
            EventStatus::Draft,
            EventStatus::Planned,
            EventStatus::RegistrationsClosed,
            EventStatus::Finished,
            EventStatus::Cancelled,
        ] {
            event.status = status;
            assert!(!event.accepts_registrations(), "{status} should be closed");
        }
    }

    #[test]
    fn test_capacity_zero_is_unlimited() {
        let event = EventInfo::new(Uuid::now_v7(), "Open house");
        assert!(!event.is_full_with(10_000));
    }

    #[test]
    fn test_full_when_count_reaches_max() {
        let mut event = EventInfo::new(Uuid::now_v7(), "Seminar");
        event.max_participants = 2;
        assert!(!event.is_full_with(1));
        assert!(event.is_full_with(2));
        assert!(event.is_full_with(3));
    }

    #[test]
    fn test_add_product_rescopes_to_event() {
        let mut event = EventInfo::new(Uuid::now_v7(), "Seminar");
        let product_id = event.add_product(Product::new(Uuid::nil(), "Fee", dec!(10)).mandatory(1));

        let product = event.product(product_id).unwrap();
        assert_eq!(product.event_id, event.id);
        assert_eq!(event.mandatory_products().count(), 1);
    }
}
