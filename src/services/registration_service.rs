use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use super::access_control::{check_admin, check_create, check_read, check_signed_in, check_update};
use super::{guard, load_event, load_registration, observe};
use crate::clock::Clock;
use crate::domain::event_info::EventStatus;
use crate::domain::order::{compose_order, mandatory_basket, CompositionOutcome, OrderStatus, ProductRequest};
use crate::domain::principal::{OrganizationContext, Principal, Role};
use crate::domain::registration::{
    Registration, RegistrationDetails, RegistrationStatus, RegistrationType,
};
use crate::errors::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::outbox::LifecycleEvent;
use crate::store::{RegistrationFilter, RegistrationStore, UnitOfWork, UserDirectory};

// ============================================================================
// Registration Lifecycle Service
// ============================================================================
//
// create_registration:
// 1. Duplicate check for (event, user)
// 2. Load event and user profile
// 3. Build the Draft registration and run the create policy check
// 4. Land in WaitingList when the event already is
// 5. Compose the mandatory basket (unless waiting-listed)
// 6. Flip the event to WaitingList once this registration fills it
// 7. Commit registration, event status and outbox in one unit
//
// The flip writes the event's status only, so catalog edits committed in
// the meantime survive. Events caused by the registration carry its
// RegistrationCreated event id as causation id.
//
// The count read in step 6 is not serialized against concurrent
// registrations, so a burst can overfill the event before it flips. The
// store's uniqueness check is the backstop for concurrent duplicates.
//
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationOptions {
    /// Compose an order for the event's mandatory products
    pub create_order: bool,
    pub registration_type: RegistrationType,
    pub notes: Option<String>,
}

impl RegistrationOptions {
    pub fn with_order() -> Self {
        Self {
            create_order: true,
            ..Self::default()
        }
    }
}

pub struct RegistrationService {
    store: Arc<dyn RegistrationStore>,
    users: Arc<dyn UserDirectory>,
    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
}

impl RegistrationService {
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        users: Arc<dyn UserDirectory>,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            users,
            clock,
            metrics,
        }
    }

    pub async fn create_registration(
        &self,
        principal: &Principal,
        org: &OrganizationContext,
        event_id: Uuid,
        user_id: Uuid,
        options: RegistrationOptions,
    ) -> AppResult<Registration> {
        let started = Instant::now();
        let result = self
            .try_create_registration(principal, org, event_id, user_id, options)
            .await;
        observe(&self.metrics, "create_registration", started, result)
    }

    async fn try_create_registration(
        &self,
        principal: &Principal,
        org: &OrganizationContext,
        event_id: Uuid,
        user_id: Uuid,
        options: RegistrationOptions,
    ) -> AppResult<Registration> {
        if self
            .store
            .find_active_registration(event_id, user_id)
            .await?
            .is_some()
        {
            return Err(AppError::Duplicate(format!(
                "User {user_id} is already registered for event {event_id}"
            )));
        }

        let event = load_event(self.store.as_ref(), event_id).await?;
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User", user_id))?;

        let mut registration = Registration::new(
            event.id,
            user.id,
            user.display_name,
            user.email,
            self.clock.now(),
        );
        registration.participant_phone = user.phone;
        registration.registration_type = options.registration_type;
        registration.notes = options.notes;

        guard(
            &self.metrics,
            "create_registration",
            principal,
            check_create(principal, org, &event, &registration),
        )?;

        if event.status == EventStatus::WaitingList {
            registration.transition(RegistrationStatus::WaitingList)?;
        }

        let mut unit = UnitOfWork::new(principal.user_id);
        let created = unit.record(LifecycleEvent::RegistrationCreated {
            registration_id: registration.id,
            event_id: event.id,
            user_id: registration.user_id,
            status: registration.status(),
        });

        let outcome = if options.create_order
            && registration.status() != RegistrationStatus::WaitingList
        {
            let outcome = compose_order(
                &mut registration,
                &event,
                &mandatory_basket(&event),
                self.clock.now(),
            )?;
            record_composition(&mut unit, &registration, &outcome, Some(created));
            Some(outcome)
        } else {
            None
        };

        let registration_count = self.store.count_registrations(event.id).await? + 1;
        let flipped =
            event.status == EventStatus::RegistrationsOpen && event.is_full_with(registration_count);
        if flipped {
            unit.record_caused_by(
                LifecycleEvent::EventMovedToWaitingList {
                    event_id: event.id,
                    registration_count,
                    max_participants: event.max_participants,
                },
                created,
            );
            unit.set_event_status(event.id, EventStatus::WaitingList);
        }

        unit.save_registration(registration.clone());
        self.store.commit(unit).await?;

        self.metrics.record_registration(registration.status().as_str());
        if let Some(outcome) = &outcome {
            self.metrics.record_composition(outcome.label());
        }
        tracing::info!(
            registration_id = %registration.id,
            event_id = %event.id,
            user_id = %registration.user_id,
            status = %registration.status(),
            order_id = ?outcome.as_ref().and_then(CompositionOutcome::order_id),
            "Registration created"
        );

        if flipped {
            self.metrics.waiting_list_flips.inc();
            tracing::info!(
                event_id = %event.id,
                registration_count,
                max_participants = event.max_participants,
                "Event is full, moved to WaitingList"
            );
        }

        Ok(registration)
    }

    /// Replace the editable fields of a registration
    pub async fn update_registration(
        &self,
        principal: &Principal,
        org: &OrganizationContext,
        registration_id: Uuid,
        details: RegistrationDetails,
    ) -> AppResult<Registration> {
        let started = Instant::now();
        let result: AppResult<Registration> = async {
            let mut registration = load_registration(self.store.as_ref(), registration_id).await?;
            let event = load_event(self.store.as_ref(), registration.event_id).await?;
            guard(
                &self.metrics,
                "update_registration",
                principal,
                check_update(principal, org, &event, &registration, self.clock.now()),
            )?;
            ensure_not_cancelled(&registration)?;

            registration.apply_details(details);

            let mut unit = UnitOfWork::new(principal.user_id);
            unit.record(LifecycleEvent::RegistrationUpdated { registration_id });
            unit.save_registration(registration.clone());
            self.store.commit(unit).await?;

            tracing::info!(registration_id = %registration_id, "Registration updated");
            Ok(registration)
        }
        .await;
        observe(&self.metrics, "update_registration", started, result)
    }

    /// Reconcile the registration's orders with a wanted basket
    pub async fn update_registration_orders(
        &self,
        principal: &Principal,
        org: &OrganizationContext,
        registration_id: Uuid,
        basket: &[ProductRequest],
    ) -> AppResult<CompositionOutcome> {
        let started = Instant::now();
        let result: AppResult<CompositionOutcome> = async {
            let mut registration = load_registration(self.store.as_ref(), registration_id).await?;
            let event = load_event(self.store.as_ref(), registration.event_id).await?;
            guard(
                &self.metrics,
                "update_registration_orders",
                principal,
                check_update(principal, org, &event, &registration, self.clock.now()),
            )?;
            ensure_not_cancelled(&registration)?;

            let outcome = compose_order(&mut registration, &event, basket, self.clock.now())?;
            if outcome == CompositionOutcome::Unchanged {
                return Ok(outcome);
            }

            let mut unit = UnitOfWork::new(principal.user_id);
            record_composition(&mut unit, &registration, &outcome, None);
            unit.save_registration(registration);
            self.store.commit(unit).await?;

            self.metrics.record_composition(outcome.label());
            tracing::info!(
                registration_id = %registration_id,
                outcome = outcome.label(),
                order_id = ?outcome.order_id(),
                "Registration orders updated"
            );
            Ok(outcome)
        }
        .await;
        observe(&self.metrics, "update_registration_orders", started, result)
    }

    /// Cancel the registration and its Draft orders. Event capacity is not
    /// reopened.
    pub async fn cancel_registration(
        &self,
        principal: &Principal,
        org: &OrganizationContext,
        registration_id: Uuid,
    ) -> AppResult<Registration> {
        let started = Instant::now();
        let result: AppResult<Registration> = async {
            let registration = load_registration(self.store.as_ref(), registration_id).await?;
            let event = load_event(self.store.as_ref(), registration.event_id).await?;
            guard(
                &self.metrics,
                "cancel_registration",
                principal,
                check_update(principal, org, &event, &registration, self.clock.now()),
            )?;
            self.cancel(principal, registration).await
        }
        .await;
        observe(&self.metrics, "cancel_registration", started, result)
    }

    /// Admin-only status change along the registration state machine
    pub async fn change_status(
        &self,
        principal: &Principal,
        org: &OrganizationContext,
        registration_id: Uuid,
        to: RegistrationStatus,
    ) -> AppResult<Registration> {
        let started = Instant::now();
        let result: AppResult<Registration> = async {
            let mut registration = load_registration(self.store.as_ref(), registration_id).await?;
            let event = load_event(self.store.as_ref(), registration.event_id).await?;
            guard(
                &self.metrics,
                "change_registration_status",
                principal,
                check_admin(principal, org, &event),
            )?;

            if to == RegistrationStatus::Cancelled {
                return self.cancel(principal, registration).await;
            }

            let from = registration.status();
            registration.transition(to)?;

            let mut unit = UnitOfWork::new(principal.user_id);
            unit.record(LifecycleEvent::RegistrationStatusChanged {
                registration_id,
                from,
                to,
            });
            unit.save_registration(registration.clone());
            self.store.commit(unit).await?;

            tracing::info!(
                registration_id = %registration_id,
                from = %from,
                to = %to,
                "Registration status changed"
            );
            Ok(registration)
        }
        .await;
        observe(&self.metrics, "change_registration_status", started, result)
    }

    pub async fn get_registration(
        &self,
        principal: &Principal,
        org: &OrganizationContext,
        registration_id: Uuid,
    ) -> AppResult<Registration> {
        let registration = load_registration(self.store.as_ref(), registration_id).await?;
        let event = load_event(self.store.as_ref(), registration.event_id).await?;
        guard(
            &self.metrics,
            "get_registration",
            principal,
            check_read(principal, org, &event, &registration),
        )?;
        Ok(registration)
    }

    /// Registrations visible to the caller: power admins see everything,
    /// organization admins their organization's events, everyone else
    /// only their own
    pub async fn list_registrations(
        &self,
        principal: &Principal,
        org: &OrganizationContext,
        filter: RegistrationFilter,
    ) -> AppResult<Vec<Registration>> {
        guard(
            &self.metrics,
            "list_registrations",
            principal,
            check_signed_in(principal),
        )?;

        let mut filter = filter;
        if !principal.is_power_admin() {
            if principal.has_role(Role::Admin) && org.organization_id.is_some() {
                filter.organization_id = org.organization_id;
            } else {
                filter.user_id = principal.user_id;
            }
        }

        Ok(self.store.list_registrations(&filter).await?)
    }

    async fn cancel(
        &self,
        principal: &Principal,
        mut registration: Registration,
    ) -> AppResult<Registration> {
        let from = registration.status();
        let cancelled_orders = registration.cancel(self.clock.now())?;

        let mut unit = UnitOfWork::new(principal.user_id);
        let status_changed = unit.record(LifecycleEvent::RegistrationStatusChanged {
            registration_id: registration.id,
            from,
            to: RegistrationStatus::Cancelled,
        });
        for order_id in &cancelled_orders {
            unit.record_caused_by(
                LifecycleEvent::OrderStatusChanged {
                    order_id: *order_id,
                    registration_id: registration.id,
                    from: OrderStatus::Draft,
                    to: OrderStatus::Cancelled,
                },
                status_changed,
            );
        }
        unit.save_registration(registration.clone());
        self.store.commit(unit).await?;

        self.metrics.registrations_cancelled.inc();
        for _ in &cancelled_orders {
            self.metrics.record_order_transition(
                OrderStatus::Draft.as_str(),
                OrderStatus::Cancelled.as_str(),
            );
        }
        tracing::info!(
            registration_id = %registration.id,
            from = %from,
            cancelled_orders = cancelled_orders.len(),
            "Registration cancelled"
        );
        Ok(registration)
    }
}

fn ensure_not_cancelled(registration: &Registration) -> AppResult<()> {
    if registration.is_cancelled() {
        return Err(AppError::InvalidOperation(format!(
            "Registration {} is cancelled",
            registration.id
        )));
    }
    Ok(())
}

fn record_composition(
    unit: &mut UnitOfWork,
    registration: &Registration,
    outcome: &CompositionOutcome,
    cause: Option<Uuid>,
) {
    let Some(order) = outcome.order_id().and_then(|id| registration.order(id)) else {
        return;
    };

    let (order_id, registration_id) = (order.id, registration.id);
    let (total_amount, line_count) = (order.total_amount(), order.lines().len());
    let event = match outcome {
        CompositionOutcome::Created { .. } => LifecycleEvent::OrderCreated {
            order_id,
            registration_id,
            total_amount,
            line_count,
        },
        _ => LifecycleEvent::OrderLinesChanged {
            order_id,
            registration_id,
            total_amount,
            line_count,
        },
    };
    match cause {
        Some(cause) => unit.record_caused_by(event, cause),
        None => unit.record(event),
    };
}

// ============================================================================
// Unit Tests
// ============================================================================
