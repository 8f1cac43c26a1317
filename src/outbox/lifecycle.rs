use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::DomainEvent;
use crate::domain::order::{OrderStatus, PaymentProvider};
use crate::domain::registration::RegistrationStatus;

// ============================================================================
// Lifecycle Events - transitions exposed to downstream collaborators
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LifecycleEvent {
    RegistrationCreated {
        registration_id: Uuid,
        event_id: Uuid,
        user_id: Uuid,
        status: RegistrationStatus,
    },
    RegistrationUpdated {
        registration_id: Uuid,
    },
    RegistrationStatusChanged {
        registration_id: Uuid,
        from: RegistrationStatus,
        to: RegistrationStatus,
    },
    OrderCreated {
        order_id: Uuid,
        registration_id: Uuid,
        total_amount: Decimal,
        line_count: usize,
    },
    OrderLinesChanged {
        order_id: Uuid,
        registration_id: Uuid,
        total_amount: Decimal,
        line_count: usize,
    },
    OrderStatusChanged {
        order_id: Uuid,
        registration_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    },
    RefundOrderCreated {
        order_id: Uuid,
        refunded_order_id: Uuid,
        registration_id: Uuid,
        total_amount: Decimal,
    },
    OrderPaymentMethodChanged {
        order_id: Uuid,
        registration_id: Uuid,
        payment_method_id: Option<Uuid>,
        provider: Option<PaymentProvider>,
    },
    EventMovedToWaitingList {
        event_id: Uuid,
        registration_count: usize,
        max_participants: u32,
    },
}

impl DomainEvent for LifecycleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LifecycleEvent::RegistrationCreated { .. } => "RegistrationCreated",
            LifecycleEvent::RegistrationUpdated { .. } => "RegistrationUpdated",
            LifecycleEvent::RegistrationStatusChanged { .. } => "RegistrationStatusChanged",
            LifecycleEvent::OrderCreated { .. } => "OrderCreated",
            LifecycleEvent::OrderLinesChanged { .. } => "OrderLinesChanged",
            LifecycleEvent::OrderStatusChanged { .. } => "OrderStatusChanged",
            LifecycleEvent::RefundOrderCreated { .. } => "RefundOrderCreated",
            LifecycleEvent::OrderPaymentMethodChanged { .. } => "OrderPaymentMethodChanged",
            LifecycleEvent::EventMovedToWaitingList { .. } => "EventMovedToWaitingList",
        }
    }

    fn aggregate_type(&self) -> &'static str {
        match self {
            LifecycleEvent::RegistrationCreated { .. }
            | LifecycleEvent::RegistrationUpdated { .. }
            | LifecycleEvent::RegistrationStatusChanged { .. } => "Registration",
            LifecycleEvent::OrderCreated { .. }
            | LifecycleEvent::OrderLinesChanged { .. }
            | LifecycleEvent::OrderStatusChanged { .. }
            | LifecycleEvent::RefundOrderCreated { .. }
            | LifecycleEvent::OrderPaymentMethodChanged { .. } => "Order",
            LifecycleEvent::EventMovedToWaitingList { .. } => "Event",
        }
    }

    fn aggregate_id(&self) -> Uuid {
        match self {
            LifecycleEvent::RegistrationCreated { registration_id, .. }
            | LifecycleEvent::RegistrationUpdated { registration_id }
            | LifecycleEvent::RegistrationStatusChanged { registration_id, .. } => *registration_id,
            LifecycleEvent::OrderCreated { order_id, .. }
            | LifecycleEvent::OrderLinesChanged { order_id, .. }
            | LifecycleEvent::OrderStatusChanged { order_id, .. }
            | LifecycleEvent::RefundOrderCreated { order_id, .. }
            | LifecycleEvent::OrderPaymentMethodChanged { order_id, .. } => *order_id,
            LifecycleEvent::EventMovedToWaitingList { event_id, .. } => *event_id,
        }
    }
}
