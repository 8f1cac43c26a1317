use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::RegistrationError;
use super::value_objects::{RegistrationStatus, RegistrationType};
use crate::domain::order::{CustomerSnapshot, Order, OrderLine, OrderStatus};

// ============================================================================
// Registration Aggregate
// ============================================================================
//
// Owns its orders: they are created, refunded and cancelled through the
// registration so the owning id always matches. Registrations are never
// deleted, only cancelled.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    // Identity
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,

    pub registration_type: RegistrationType,
    pub registration_time: DateTime<Utc>,

    // Participant
    pub participant_name: String,
    pub participant_email: String,
    pub participant_phone: Option<String>,

    // Customer (who pays); falls back to the participant when unset
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_vat_number: Option<String>,
    pub customer_invoice_reference: Option<String>,

    pub notes: Option<String>,

    status: RegistrationStatus,
    orders: Vec<Order>,

    /// Store version this copy was loaded at; 0 until first committed
    #[serde(skip)]
    version: i64,
}

/// The fields a participant or admin may edit after registering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationDetails {
    pub registration_type: RegistrationType,
    pub participant_name: String,
    pub participant_email: String,
    pub participant_phone: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_vat_number: Option<String>,
    pub customer_invoice_reference: Option<String>,
    pub notes: Option<String>,
}

impl Registration {
    pub fn new(
        event_id: Uuid,
        user_id: Uuid,
        participant_name: impl Into<String>,
        participant_email: impl Into<String>,
        registration_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_id,
            user_id,
            registration_type: RegistrationType::default(),
            registration_time,
            participant_name: participant_name.into(),
            participant_email: participant_email.into(),
            participant_phone: None,
            customer_name: None,
            customer_email: None,
            customer_vat_number: None,
            customer_invoice_reference: None,
            notes: None,
            status: RegistrationStatus::Draft,
            orders: Vec::new(),
            version: 0,
        }
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    pub fn status(&self) -> RegistrationStatus {
        self.status
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == RegistrationStatus::Cancelled
    }

    pub fn transition(&mut self, to: RegistrationStatus) -> Result<(), RegistrationError> {
        if !self.status.can_transition_to(to) {
            return Err(RegistrationError::InvalidStateTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Cancel the registration and every Draft order on it.
    /// Verified and invoiced orders are left for the invoicing flow.
    pub fn cancel(&mut self, at: DateTime<Utc>) -> Result<Vec<Uuid>, RegistrationError> {
        self.transition(RegistrationStatus::Cancelled)?;

        let mut cancelled = Vec::new();
        for order in self.orders.iter_mut().filter(|o| o.status() == OrderStatus::Draft) {
            order.transition(OrderStatus::Cancelled, Some("Registration cancelled"), at)?;
            cancelled.push(order.id);
        }
        Ok(cancelled)
    }

    pub fn details(&self) -> RegistrationDetails {
        RegistrationDetails {
            registration_type: self.registration_type,
            participant_name: self.participant_name.clone(),
            participant_email: self.participant_email.clone(),
            participant_phone: self.participant_phone.clone(),
            customer_name: self.customer_name.clone(),
            customer_email: self.customer_email.clone(),
            customer_vat_number: self.customer_vat_number.clone(),
            customer_invoice_reference: self.customer_invoice_reference.clone(),
            notes: self.notes.clone(),
        }
    }

    /// Replace the editable fields. Existing orders keep their snapshots.
    pub fn apply_details(&mut self, details: RegistrationDetails) {
        self.registration_type = details.registration_type;
        self.participant_name = details.participant_name;
        self.participant_email = details.participant_email;
        self.participant_phone = details.participant_phone;
        self.customer_name = details.customer_name;
        self.customer_email = details.customer_email;
        self.customer_vat_number = details.customer_vat_number;
        self.customer_invoice_reference = details.customer_invoice_reference;
        self.notes = details.notes;
    }

    pub fn customer_snapshot(&self) -> CustomerSnapshot {
        CustomerSnapshot {
            user_id: self.user_id,
            customer_name: self
                .customer_name
                .clone()
                .unwrap_or_else(|| self.participant_name.clone()),
            customer_email: self
                .customer_email
                .clone()
                .unwrap_or_else(|| self.participant_email.clone()),
            customer_vat_number: self.customer_vat_number.clone(),
            customer_invoice_reference: self.customer_invoice_reference.clone(),
        }
    }

    // ------------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------------

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn order(&self, order_id: Uuid) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == order_id)
    }

    pub fn order_mut(&mut self, order_id: Uuid) -> Result<&mut Order, RegistrationError> {
        self.orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or(RegistrationError::OrderNotFound(order_id))
    }

    /// New Draft order carrying a snapshot of the current customer details
    pub fn create_order(&mut self, lines: Vec<OrderLine>, at: DateTime<Utc>) -> Uuid {
        let order = Order::new(self.id, self.customer_snapshot(), lines, at);
        let id = order.id;
        self.orders.push(order);
        id
    }

    pub fn create_refund_order(
        &mut self,
        order_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Uuid, RegistrationError> {
        let source = self
            .order(order_id)
            .ok_or(RegistrationError::OrderNotFound(order_id))?;
        let refund = source.create_refund_order(at)?;
        let id = refund.id;
        self.orders.push(refund);
        Ok(id)
    }

    /// Orders still counting towards what has been bought
    pub fn active_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|o| !o.status().is_settled_out())
    }

    /// Draft and Verified orders, lowest id first
    pub fn editable_orders(&self) -> Vec<&Order> {
        let mut editable: Vec<&Order> = self.orders.iter().filter(|o| o.can_edit()).collect();
        editable.sort_by_key(|o| o.id);
        editable
    }

    pub fn first_editable_order_id(&self) -> Option<Uuid> {
        self.editable_orders().first().map(|o| o.id)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
