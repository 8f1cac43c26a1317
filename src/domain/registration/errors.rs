use uuid::Uuid;

use super::value_objects::RegistrationStatus;
use crate::domain::order::OrderError;

// ============================================================================
// Registration Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Cannot move registration from {from} to {to}")]
    InvalidStateTransition {
        from: RegistrationStatus,
        to: RegistrationStatus,
    },

    #[error("Order not found on registration: {0}")]
    OrderNotFound(Uuid),

    #[error(transparent)]
    Order(#[from] OrderError),
}
