use chrono::{DateTime, Duration, Utc};

use crate::domain::event_info::EventInfo;
use crate::domain::principal::{OrganizationContext, Principal, Role};
use crate::domain::registration::Registration;
use crate::errors::{AppError, AppResult};

// ============================================================================
// Access Control & Policy Gate
// ============================================================================
//
// Pure checks over (principal, organization context, event, registration).
// Each returns `AppError::NotAccessible` on denial; callers log and count it.
//
// - read:   owner, admin of the event's organization, or power admin
// - create: read rule, plus the event must accept registrations
//           (power admins bypass)
// - update: admins always; a non-admin owner only inside the edit window
//           and before the last cancellation date (unless allowed)
//
// ============================================================================

/// Admin of the organization that owns the event, acting within it
pub fn is_event_admin(principal: &Principal, org: &OrganizationContext, event: &EventInfo) -> bool {
    principal.is_power_admin()
        || (principal.has_role(Role::Admin) && org.organization_id == Some(event.organization_id))
}

pub fn check_read(
    principal: &Principal,
    org: &OrganizationContext,
    event: &EventInfo,
    registration: &Registration,
) -> AppResult<()> {
    check_signed_in(principal)?;
    if is_event_admin(principal, org, event) || principal.is_owner(registration.user_id) {
        return Ok(());
    }
    Err(AppError::not_accessible(format!(
        "Registration {} belongs to another user",
        registration.id
    )))
}

pub fn check_create(
    principal: &Principal,
    org: &OrganizationContext,
    event: &EventInfo,
    registration: &Registration,
) -> AppResult<()> {
    check_read(principal, org, event, registration)?;

    if !event.accepts_registrations() && !principal.is_power_admin() {
        return Err(AppError::not_accessible(format!(
            "Event {} is not open for registration (status {})",
            event.id, event.status
        )));
    }
    Ok(())
}

pub fn check_update(
    principal: &Principal,
    org: &OrganizationContext,
    event: &EventInfo,
    registration: &Registration,
    now: DateTime<Utc>,
) -> AppResult<()> {
    check_signed_in(principal)?;
    if is_event_admin(principal, org, event) {
        return Ok(());
    }
    if !principal.is_owner(registration.user_id) {
        return Err(AppError::not_accessible(format!(
            "Registration {} belongs to another user",
            registration.id
        )));
    }

    if let Some(hours) = event.policy.allowed_registration_edit_hours {
        let deadline = registration.registration_time + Duration::hours(i64::from(hours));
        if now > deadline {
            return Err(AppError::not_accessible(format!(
                "Registration {} can only be edited within {} hours of registering",
                registration.id, hours
            )));
        }
    }

    if !event.policy.allow_modifications_after_last_cancellation_date {
        if let Some(last_cancellation) = event.last_cancellation_date {
            if now > last_cancellation {
                return Err(AppError::not_accessible(format!(
                    "Registration {} is locked after the last cancellation date {}",
                    registration.id,
                    last_cancellation.to_rfc3339()
                )));
            }
        }
    }
    Ok(())
}

/// Admin-only operations (status changes, refunds)
pub fn check_admin(
    principal: &Principal,
    org: &OrganizationContext,
    event: &EventInfo,
) -> AppResult<()> {
    check_signed_in(principal)?;
    if is_event_admin(principal, org, event) {
        return Ok(());
    }
    Err(AppError::not_accessible(format!(
        "Only administrators of event {} may do this",
        event.id
    )))
}

pub fn check_signed_in(principal: &Principal) -> AppResult<()> {
    if principal.is_anonymous() {
        return Err(AppError::not_accessible("Sign in required"));
    }
    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================
