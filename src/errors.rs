use uuid::Uuid;

use crate::domain::order::OrderError;
use crate::domain::registration::RegistrationError;
use crate::store::StoreError;

// ============================================================================
// Application Errors - Business Rule Violations Surfaced to Callers
// ============================================================================
//
// Every service operation returns `AppError`. None of these are retried
// inside the core; the API layer maps `kind()` to a user-facing response.
// `Conflict` means another operation changed the same registration or event
// first; nothing was written and the caller may reload and try again.
//
// ============================================================================

/// Coarse classification of every failure the core can report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputError,
    Duplicate,
    InvalidStateTransition,
    InvalidOperation,
    NotAccessible,
    OrderUpdate,
    NotFound,
    Conflict,
    Unexpected,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InputError => "InputError",
            ErrorKind::Duplicate => "Duplicate",
            ErrorKind::InvalidStateTransition => "InvalidStateTransition",
            ErrorKind::InvalidOperation => "InvalidOperation",
            ErrorKind::NotAccessible => "NotAccessible",
            ErrorKind::OrderUpdate => "OrderUpdate",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::Unexpected => "Unexpected",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Not accessible: {0}")]
    NotAccessible(String),

    #[error("Order {order_id} cannot be updated: {reason}")]
    OrderUpdate { order_id: Uuid, reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("{entity} {id} was changed by another operation")]
    Conflict { entity: &'static str, id: Uuid },

    #[error("Unexpected failure: {0}")]
    Unexpected(#[source] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Input(_) => ErrorKind::InputError,
            AppError::Duplicate(_) => ErrorKind::Duplicate,
            AppError::InvalidStateTransition { .. } => ErrorKind::InvalidStateTransition,
            AppError::InvalidOperation(_) => ErrorKind::InvalidOperation,
            AppError::NotAccessible(_) => ErrorKind::NotAccessible,
            AppError::OrderUpdate { .. } => ErrorKind::OrderUpdate,
            AppError::NotFound { .. } => ErrorKind::NotFound,
            AppError::Conflict { .. } => ErrorKind::Conflict,
            AppError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        AppError::Input(message.into())
    }

    pub fn not_accessible(message: impl Into<String>) -> Self {
        AppError::NotAccessible(message.into())
    }

    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        AppError::NotFound { entity, id }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidStateTransition { from, to } => AppError::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            },
            OrderError::InvalidLine(message) => AppError::Input(message),
            OrderError::LineNotFound(id) => AppError::not_found("OrderLine", id),
            other @ (OrderError::InvalidOperation(_) | OrderError::NotEditable { .. }) => {
                AppError::InvalidOperation(other.to_string())
            }
        }
    }
}

impl From<RegistrationError> for AppError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::InvalidStateTransition { from, to } => {
                AppError::InvalidStateTransition {
                    from: from.to_string(),
                    to: to.to_string(),
                }
            }
            RegistrationError::OrderNotFound(id) => AppError::not_found("Order", id),
            RegistrationError::Order(order_err) => order_err.into(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(message) => AppError::Duplicate(message),
            StoreError::NotFound { entity, id } => AppError::NotFound { entity, id },
            StoreError::Conflict { entity, id, .. } => AppError::Conflict { entity, id },
            other => AppError::Unexpected(anyhow::Error::new(other)),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
