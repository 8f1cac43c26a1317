use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

// ============================================================================
// Acting Principal - passed explicitly to every service operation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Administrator of the organization currently selected
    Admin,
    SuperAdmin,
    SystemAdmin,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Option<Uuid>,
    pub roles: BTreeSet<Role>,
}

impl Principal {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            roles: BTreeSet::new(),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.insert(role);
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// System- or super-administrator; bypasses organization scoping
    pub fn is_power_admin(&self) -> bool {
        self.has_role(Role::SystemAdmin) || self.has_role(Role::SuperAdmin)
    }

    pub fn is_owner(&self, user_id: Uuid) -> bool {
        self.user_id == Some(user_id)
    }
}

/// The organization the caller is acting within, resolved by the API layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationContext {
    pub organization_id: Option<Uuid>,
}

impl OrganizationContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn of(organization_id: Uuid) -> Self {
        Self {
            organization_id: Some(organization_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_admin_roles() {
        let id = Uuid::now_v7();
        assert!(Principal::user(id).with_role(Role::SystemAdmin).is_power_admin());
        assert!(Principal::user(id).with_role(Role::SuperAdmin).is_power_admin());
        assert!(!Principal::user(id).with_role(Role::Admin).is_power_admin());
    }

    #[test]
    fn test_anonymous_owns_nothing() {
        let anon = Principal::anonymous();
        assert!(anon.is_anonymous());
        assert!(!anon.is_owner(Uuid::now_v7()));
    }
}
