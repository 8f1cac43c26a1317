use uuid::Uuid;

use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Cannot move order from {from} to {to}")]
    InvalidStateTransition { from: OrderStatus, to: OrderStatus },

    #[error("{0}")]
    InvalidOperation(String),

    #[error("Order {order_id} is not editable in status {status}")]
    NotEditable { order_id: Uuid, status: OrderStatus },

    #[error("Invalid order line: {0}")]
    InvalidLine(String),

    #[error("Order line not found: {0}")]
    LineNotFound(Uuid),
}
