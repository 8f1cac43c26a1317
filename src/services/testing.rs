use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::Barrier;
use uuid::Uuid;

use super::{OrderManagementService, RegistrationService};
use crate::clock::FixedClock;
use crate::domain::catalog::Product;
use crate::domain::event_info::EventInfo;
use crate::domain::registration::Registration;
use crate::metrics::Metrics;
use crate::store::{
    InMemoryStore, InMemoryUserDirectory, RegistrationFilter, RegistrationStore, StoreError,
    UnitOfWork,
};

// ============================================================================
// Service Test Fixtures
// ============================================================================

pub(crate) fn registered_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap()
}

/// Event with one mandatory product priced 100 without VAT
pub(crate) fn course_event(max_participants: u32) -> (EventInfo, Uuid) {
    let mut event = EventInfo::new(Uuid::now_v7(), "Course");
    event.max_participants = max_participants;
    let product_id = event.add_product(Product::new(event.id, "Course fee", dec!(100)).mandatory(1));
    (event, product_id)
}

pub(crate) struct Harness {
    pub store: Arc<InMemoryStore>,
    pub users: Arc<InMemoryUserDirectory>,
    pub metrics: Arc<Metrics>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            users: Arc::new(InMemoryUserDirectory::new()),
            metrics: Arc::new(Metrics::new().unwrap()),
        }
    }

    /// Registration service whose clock is frozen at `now`
    pub fn registrations_at(&self, now: DateTime<Utc>) -> RegistrationService {
        RegistrationService::new(
            self.store.clone(),
            self.users.clone(),
            Arc::new(FixedClock::new(now)),
            self.metrics.clone(),
        )
    }

    pub fn registrations(&self) -> RegistrationService {
        self.registrations_at(registered_at())
    }

    pub fn orders_at(&self, now: DateTime<Utc>) -> OrderManagementService {
        OrderManagementService::new(
            self.store.clone(),
            Arc::new(FixedClock::new(now)),
            self.metrics.clone(),
        )
    }

    pub fn orders(&self) -> OrderManagementService {
        self.orders_at(registered_at())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GatePoint {
    RegistrationCount,
    OrderLookup,
}

/// Holds every caller at one read until `parties` callers have made it, so
/// none of them has committed yet
pub(crate) struct GatedStore {
    inner: InMemoryStore,
    gate: Barrier,
    point: GatePoint,
}

impl GatedStore {
    /// Gate on `count_registrations`
    pub fn new(parties: usize) -> Self {
        Self::gated_at(GatePoint::RegistrationCount, parties)
    }

    /// Gate on `find_registration_by_order`
    pub fn at_order_lookup(parties: usize) -> Self {
        Self::gated_at(GatePoint::OrderLookup, parties)
    }

    fn gated_at(point: GatePoint, parties: usize) -> Self {
        Self {
            inner: InMemoryStore::new(),
            gate: Barrier::new(parties),
            point,
        }
    }

    async fn pass(&self, point: GatePoint) {
        if self.point == point {
            self.gate.wait().await;
        }
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }
}

#[async_trait]
impl RegistrationStore for GatedStore {
    async fn load_event(&self, event_id: Uuid) -> Result<Option<EventInfo>, StoreError> {
        self.inner.load_event(event_id).await
    }

    async fn load_registration(
        &self,
        registration_id: Uuid,
    ) -> Result<Option<Registration>, StoreError> {
        self.inner.load_registration(registration_id).await
    }

    async fn find_active_registration(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Registration>, StoreError> {
        self.inner.find_active_registration(event_id, user_id).await
    }

    async fn find_registration_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Registration>, StoreError> {
        let found = self.inner.find_registration_by_order(order_id).await?;
        self.pass(GatePoint::OrderLookup).await;
        Ok(found)
    }

    async fn count_registrations(&self, event_id: Uuid) -> Result<usize, StoreError> {
        let count = self.inner.count_registrations(event_id).await?;
        self.pass(GatePoint::RegistrationCount).await;
        Ok(count)
    }

    async fn list_registrations(
        &self,
        filter: &RegistrationFilter,
    ) -> Result<Vec<Registration>, StoreError> {
        self.inner.list_registrations(filter).await
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError> {
        self.inner.commit(unit).await
    }
}
