// ============================================================================
// Services - Registration lifecycle and order management
// ============================================================================
//
// Every operation takes the acting `Principal` and `OrganizationContext`
// explicitly, runs its policy check, mutates the aggregates in memory and
// hands one `UnitOfWork` to the store. Dropping an operation's future
// before it reaches `commit` leaves the store untouched.
//
// ============================================================================

pub mod access_control;
mod order_service;
mod registration_service;

#[cfg(test)]
pub(crate) mod testing;

pub use order_service::OrderManagementService;
pub use registration_service::{RegistrationOptions, RegistrationService};

use std::time::Instant;
use uuid::Uuid;

use crate::domain::event_info::EventInfo;
use crate::domain::principal::Principal;
use crate::domain::registration::Registration;
use crate::errors::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::store::RegistrationStore;

/// Log and count a denied policy check, then pass the result through
pub(crate) fn guard(
    metrics: &Metrics,
    operation: &'static str,
    principal: &Principal,
    check: AppResult<()>,
) -> AppResult<()> {
    if let Err(err) = &check {
        tracing::warn!(
            operation,
            user_id = ?principal.user_id,
            error = %err,
            "Access denied"
        );
        metrics.record_access_denied(operation);
    }
    check
}

/// Record latency and failure kind of a finished operation
pub(crate) fn observe<T>(
    metrics: &Metrics,
    operation: &'static str,
    started: Instant,
    result: AppResult<T>,
) -> AppResult<T> {
    let failure = result.as_ref().err().map(|e| e.kind().as_str());
    if let Some(kind) = failure {
        tracing::debug!(operation, kind, "Operation failed");
    }
    metrics.record_operation(operation, started.elapsed().as_secs_f64(), failure);
    result
}

pub(crate) async fn load_event(store: &dyn RegistrationStore, event_id: Uuid) -> AppResult<EventInfo> {
    store
        .load_event(event_id)
        .await?
        .ok_or_else(|| AppError::not_found("Event", event_id))
}

pub(crate) async fn load_registration(
    store: &dyn RegistrationStore,
    registration_id: Uuid,
) -> AppResult<Registration> {
    store
        .load_registration(registration_id)
        .await?
        .ok_or_else(|| AppError::not_found("Registration", registration_id))
}
