use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use super::access_control::{check_admin, check_read, check_update};
use super::{guard, load_event, load_registration, observe};
use crate::clock::Clock;
use crate::domain::event_info::EventInfo;
use crate::domain::order::composition::resolve_requests;
use crate::domain::order::{Order, OrderLine, OrderStatus, OrderUpdates, PaymentMethod};
use crate::domain::principal::{OrganizationContext, Principal};
use crate::domain::registration::Registration;
use crate::errors::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::outbox::LifecycleEvent;
use crate::store::{RegistrationStore, UnitOfWork};

// ============================================================================
// Order Management Service - administrative order mutations
// ============================================================================
//
// Orders are stored inside their registration, so every operation loads the
// owning registration, mutates one order and commits the registration back.
//
// `update_order` refuses Invoiced and Cancelled orders before any access
// check: they are immutable for every caller.
//
// ============================================================================

pub struct OrderManagementService {
    store: Arc<dyn RegistrationStore>,
    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
}

impl OrderManagementService {
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            clock,
            metrics,
        }
    }

    async fn load_owner(&self, order_id: Uuid) -> AppResult<(Registration, EventInfo)> {
        let registration = self
            .store
            .find_registration_by_order(order_id)
            .await?
            .ok_or_else(|| AppError::not_found("Order", order_id))?;
        let event = load_event(self.store.as_ref(), registration.event_id).await?;
        Ok((registration, event))
    }

    pub async fn cancel_order(
        &self,
        principal: &Principal,
        org: &OrganizationContext,
        order_id: Uuid,
    ) -> AppResult<Order> {
        let started = Instant::now();
        let result: AppResult<Order> = async {
            let (registration, event) = self.load_owner(order_id).await?;
            guard(
                &self.metrics,
                "cancel_order",
                principal,
                check_update(principal, org, &event, &registration, self.clock.now()),
            )?;
            self.change_status(principal, registration, order_id, OrderStatus::Cancelled, None)
                .await
        }
        .await;
        observe(&self.metrics, "cancel_order", started, result)
    }

    /// Admin-only status change, used by the invoicing flow
    pub async fn transition_order(
        &self,
        principal: &Principal,
        org: &OrganizationContext,
        order_id: Uuid,
        to: OrderStatus,
        note: Option<&str>,
    ) -> AppResult<Order> {
        let started = Instant::now();
        let result: AppResult<Order> = async {
            let (registration, event) = self.load_owner(order_id).await?;
            guard(
                &self.metrics,
                "transition_order",
                principal,
                check_admin(principal, org, &event),
            )?;
            self.change_status(principal, registration, order_id, to, note)
                .await
        }
        .await;
        observe(&self.metrics, "transition_order", started, result)
    }

    /// Apply line changes to one order
    pub async fn update_order(
        &self,
        principal: &Principal,
        org: &OrganizationContext,
        order_id: Uuid,
        updates: &OrderUpdates,
    ) -> AppResult<Order> {
        let started = Instant::now();
        let result: AppResult<Order> = async {
            let (mut registration, event) = self.load_owner(order_id).await?;

            let status = registration.order_mut(order_id)?.status();
            if matches!(status, OrderStatus::Invoiced | OrderStatus::Cancelled) {
                return Err(AppError::OrderUpdate {
                    order_id,
                    reason: format!("order is {status}"),
                });
            }

            guard(
                &self.metrics,
                "update_order",
                principal,
                check_update(principal, org, &event, &registration, self.clock.now()),
            )?;

            let resolved = resolve_requests(&event, updates.products())?;
            let order = registration.order_mut(order_id)?;
            for request in resolved {
                let existing = order
                    .lines()
                    .iter()
                    .find(|l| {
                        !l.is_refund() && l.matches(request.product.id, request.variant.map(|v| v.id))
                    })
                    .map(|l| l.id);

                match (existing, request.quantity) {
                    (Some(line_id), 0) => {
                        order.remove_line(line_id)?;
                    }
                    (Some(line_id), quantity) => {
                        order.update_line_quantity(line_id, request.product.floor_quantity(quantity))?;
                    }
                    (None, 0) => {}
                    (None, quantity) => {
                        order.add_line(OrderLine::for_product(
                            request.product,
                            request.variant,
                            request.product.floor_quantity(quantity),
                        ))?;
                    }
                }
            }
            let order = order.clone();

            let mut unit = UnitOfWork::new(principal.user_id);
            unit.record(LifecycleEvent::OrderLinesChanged {
                order_id,
                registration_id: registration.id,
                total_amount: order.total_amount(),
                line_count: order.lines().len(),
            });
            unit.save_registration(registration);
            self.store.commit(unit).await?;

            tracing::info!(
                order_id = %order_id,
                line_count = order.lines().len(),
                total_amount = %order.total_amount(),
                "Order lines updated"
            );
            Ok(order)
        }
        .await;
        observe(&self.metrics, "update_order", started, result)
    }

    /// Admin-only: add a Draft sibling reversing an invoiced order
    pub async fn create_refund_order(
        &self,
        principal: &Principal,
        org: &OrganizationContext,
        order_id: Uuid,
    ) -> AppResult<Order> {
        let started = Instant::now();
        let result: AppResult<Order> = async {
            let (mut registration, event) = self.load_owner(order_id).await?;
            guard(
                &self.metrics,
                "create_refund_order",
                principal,
                check_admin(principal, org, &event),
            )?;

            let refund_id = registration.create_refund_order(order_id, self.clock.now())?;
            let refund = registration.order_mut(refund_id)?.clone();

            let mut unit = UnitOfWork::new(principal.user_id);
            unit.record(LifecycleEvent::RefundOrderCreated {
                order_id: refund_id,
                refunded_order_id: order_id,
                registration_id: registration.id,
                total_amount: refund.total_amount(),
            });
            unit.save_registration(registration);
            self.store.commit(unit).await?;

            self.metrics.refund_orders_created.inc();
            tracing::info!(
                order_id = %refund_id,
                refunded_order_id = %order_id,
                total_amount = %refund.total_amount(),
                "Refund order created"
            );
            Ok(refund)
        }
        .await;
        observe(&self.metrics, "create_refund_order", started, result)
    }

    /// Choose how an editable order will be paid; `None` clears the choice
    pub async fn set_payment_method(
        &self,
        principal: &Principal,
        org: &OrganizationContext,
        order_id: Uuid,
        payment_method: Option<PaymentMethod>,
    ) -> AppResult<Order> {
        let started = Instant::now();
        let result: AppResult<Order> = async {
            let (mut registration, event) = self.load_owner(order_id).await?;
            guard(
                &self.metrics,
                "set_payment_method",
                principal,
                check_update(principal, org, &event, &registration, self.clock.now()),
            )?;

            let order = registration.order_mut(order_id)?;
            let note = match &payment_method {
                Some(method) => format!("Payment method set to {}", method.name),
                None => "Payment method cleared".to_string(),
            };
            order.set_payment_method(payment_method.clone())?;
            order.add_log(&note, self.clock.now());
            let order = order.clone();

            let mut unit = UnitOfWork::new(principal.user_id);
            unit.record(LifecycleEvent::OrderPaymentMethodChanged {
                order_id,
                registration_id: registration.id,
                payment_method_id: payment_method.as_ref().map(|m| m.id),
                provider: payment_method.as_ref().map(|m| m.provider),
            });
            unit.save_registration(registration);
            self.store.commit(unit).await?;

            tracing::info!(
                order_id = %order_id,
                payment_method = ?payment_method.as_ref().map(|m| m.provider),
                "Order payment method changed"
            );
            Ok(order)
        }
        .await;
        observe(&self.metrics, "set_payment_method", started, result)
    }

    pub async fn get_order(
        &self,
        principal: &Principal,
        org: &OrganizationContext,
        order_id: Uuid,
    ) -> AppResult<Order> {
        let (registration, event) = self.load_owner(order_id).await?;
        guard(
            &self.metrics,
            "get_order",
            principal,
            check_read(principal, org, &event, &registration),
        )?;
        registration
            .order(order_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Order", order_id))
    }

    pub async fn list_orders(
        &self,
        principal: &Principal,
        org: &OrganizationContext,
        registration_id: Uuid,
    ) -> AppResult<Vec<Order>> {
        let registration = load_registration(self.store.as_ref(), registration_id).await?;
        let event = load_event(self.store.as_ref(), registration.event_id).await?;
        guard(
            &self.metrics,
            "list_orders",
            principal,
            check_read(principal, org, &event, &registration),
        )?;
        Ok(registration.orders().to_vec())
    }

    async fn change_status(
        &self,
        principal: &Principal,
        mut registration: Registration,
        order_id: Uuid,
        to: OrderStatus,
        note: Option<&str>,
    ) -> AppResult<Order> {
        let order = registration.order_mut(order_id)?;
        let from = order.status();
        order.transition(to, note, self.clock.now())?;
        let order = order.clone();

        let mut unit = UnitOfWork::new(principal.user_id);
        unit.record(LifecycleEvent::OrderStatusChanged {
            order_id,
            registration_id: registration.id,
            from,
            to,
        });
        unit.save_registration(registration);
        self.store.commit(unit).await?;

        self.metrics
            .record_order_transition(from.as_str(), to.as_str());
        tracing::info!(
            order_id = %order_id,
            from = %from,
            to = %to,
            "Order status changed"
        );
        Ok(order)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
