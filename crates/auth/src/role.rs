use serde::{Deserialize, Serialize};

use castellan_core::RoleId;

use crate::permission::PermissionId;

/// Named, reusable bundle of permissions assigned to users.
///
/// Membership is kept deduplicated in insertion order: display surfaces show
/// the list as curated, while resolution treats it as a set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub permissions: Vec<PermissionId>,
    /// System roles back the built-in admin surface; renaming, deleting, or
    /// reducing their membership requires a bypass-capable actor.
    pub is_system: bool,
    /// Display/filter flag only. Inactive roles still resolve for the users
    /// holding them (see `resolver` tests).
    pub is_active: bool,
    /// Capability flag: holders pass every permission policy unconditionally.
    /// Set at creation time; replaces any name-based superuser convention.
    pub bypasses_permission_checks: bool,
    /// Optimistic concurrency version, maintained by the store.
    pub version: u64,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: RoleId::new(),
            name: name.into(),
            permissions: Vec::new(),
            is_system: false,
            is_active: true,
            bypasses_permission_checks: false,
            version: 1,
        }
    }

    /// Add a permission to the role; returns false if already present.
    pub fn add_permission(&mut self, id: PermissionId) -> bool {
        if self.permissions.contains(&id) {
            return false;
        }
        self.permissions.push(id);
        true
    }

    /// Remove a permission from the role; returns false if it was absent.
    pub fn remove_permission(&mut self, id: &PermissionId) -> bool {
        let before = self.permissions.len();
        self.permissions.retain(|p| p != id);
        self.permissions.len() != before
    }

    pub fn has_permission(&self, id: &PermissionId) -> bool {
        self.permissions.contains(id)
    }

    pub fn references(&self, id: &PermissionId) -> bool {
        self.has_permission(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perm(s: &'static str) -> PermissionId {
        PermissionId::from_static(s)
    }

    #[test]
    fn membership_is_deduplicated_and_ordered() {
        let mut role = Role::new("editor");
        assert!(role.add_permission(perm("posts.create")));
        assert!(role.add_permission(perm("posts.read")));
        assert!(!role.add_permission(perm("posts.create")));

        assert_eq!(role.permissions, vec![perm("posts.create"), perm("posts.read")]);
    }

    #[test]
    fn remove_reports_absence() {
        let mut role = Role::new("editor");
        role.add_permission(perm("posts.read"));

        assert!(role.remove_permission(&perm("posts.read")));
        assert!(!role.remove_permission(&perm("posts.read")));
        assert!(role.permissions.is_empty());
    }
}
