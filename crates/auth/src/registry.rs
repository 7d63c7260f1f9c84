//! Role registry: creation, membership, and lifecycle of roles.
//!
//! Lifecycle rules enforced here, not scattered across handlers:
//! - role names are unique and non-empty;
//! - membership may only reference catalog permissions (no dangling ids);
//! - system roles are renamed, deleted, or reduced only by bypass-capable
//!   actors;
//! - a role still assigned to a user cannot be deleted.

use thiserror::Error;

use castellan_core::{ExpectedVersion, RoleId};

use crate::permission::PermissionId;
use crate::resolver::Principal;
use crate::role::Role;
use crate::store::{PermissionStore, RoleStore, StoreError, UserStore};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid role name: {0}")]
    InvalidName(String),

    #[error("role '{0}' already exists")]
    DuplicateName(String),

    #[error("role not found")]
    UnknownRole(RoleId),

    #[error("permission '{0}' is not in the catalog")]
    UnknownPermission(PermissionId),

    #[error("system role '{0}' may only be modified by a bypass-capable role")]
    SystemRole(String),

    #[error("creating a system or bypass-capable role requires a bypass-capable actor")]
    PrivilegedRole,

    #[error("role '{0}' is still assigned to at least one user")]
    StillAssigned(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Parameters for creating a role.
#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
    pub permissions: Vec<PermissionId>,
    pub is_system: bool,
    pub bypasses_permission_checks: bool,
}

impl NewRole {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions: Vec::new(),
            is_system: false,
            bypasses_permission_checks: false,
        }
    }

    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = PermissionId>) -> Self {
        self.permissions = permissions.into_iter().collect();
        self
    }
}

/// Registry operations over the store contracts.
pub struct RoleRegistry<R, U, P> {
    roles: R,
    users: U,
    permissions: P,
}

impl<R, U, P> RoleRegistry<R, U, P>
where
    R: RoleStore,
    U: UserStore,
    P: PermissionStore,
{
    pub fn new(roles: R, users: U, permissions: P) -> Self {
        Self {
            roles,
            users,
            permissions,
        }
    }

    pub fn create(&self, actor: &Principal, spec: NewRole) -> Result<Role, RegistryError> {
        // A bypass-capable or system role grants everything; only an actor
        // who already has that power may mint one.
        if (spec.is_system || spec.bypasses_permission_checks)
            && !actor.bypasses_permission_checks()
        {
            return Err(RegistryError::PrivilegedRole);
        }

        let name = spec.name.trim();
        if name.is_empty() {
            return Err(RegistryError::InvalidName("name cannot be empty".into()));
        }
        if self.roles.by_name(name)?.is_some() {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }

        let mut role = Role::new(name);
        role.is_system = spec.is_system;
        role.bypasses_permission_checks = spec.bypasses_permission_checks;
        for id in spec.permissions {
            self.ensure_in_catalog(&id)?;
            role.add_permission(id);
        }

        let role = self.roles.insert(role)?;
        tracing::info!(role = %role.name, role_id = %role.id, "role created");
        Ok(role)
    }

    pub fn rename(
        &self,
        actor: &Principal,
        role_id: RoleId,
        new_name: &str,
    ) -> Result<Role, RegistryError> {
        let mut role = self.load(role_id)?;
        self.ensure_system_guard(actor, &role)?;

        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(RegistryError::InvalidName("name cannot be empty".into()));
        }
        if new_name != role.name && self.roles.by_name(new_name)?.is_some() {
            return Err(RegistryError::DuplicateName(new_name.to_string()));
        }

        let expected = ExpectedVersion::Exact(role.version);
        role.name = new_name.to_string();
        Ok(self.roles.update(role, expected)?)
    }

    /// Delete a role. Refused while any user still holds it.
    pub fn delete(&self, actor: &Principal, role_id: RoleId) -> Result<(), RegistryError> {
        let role = self.load(role_id)?;
        self.ensure_system_guard(actor, &role)?;

        if self.users.any_with_role(role_id)? {
            return Err(RegistryError::StillAssigned(role.name));
        }

        self.roles.remove(role_id)?;
        tracing::info!(role = %role.name, actor = %actor.user_id, "role deleted");
        Ok(())
    }

    /// Add a permission to a role's membership.
    ///
    /// Growing a system role is allowed for any actor; only reduction is
    /// guarded.
    pub fn add_permission(
        &self,
        role_id: RoleId,
        id: PermissionId,
    ) -> Result<Role, RegistryError> {
        self.ensure_in_catalog(&id)?;

        let mut role = self.load(role_id)?;
        let expected = ExpectedVersion::Exact(role.version);
        role.add_permission(id);
        Ok(self.roles.update(role, expected)?)
    }

    pub fn remove_permission(
        &self,
        actor: &Principal,
        role_id: RoleId,
        id: &PermissionId,
    ) -> Result<Role, RegistryError> {
        let mut role = self.load(role_id)?;
        self.ensure_system_guard(actor, &role)?;

        let expected = ExpectedVersion::Exact(role.version);
        role.remove_permission(id);
        Ok(self.roles.update(role, expected)?)
    }

    /// Toggle the display/filter flag. Does not affect resolution.
    pub fn set_active(&self, role_id: RoleId, active: bool) -> Result<Role, RegistryError> {
        let mut role = self.load(role_id)?;
        let expected = ExpectedVersion::Exact(role.version);
        role.is_active = active;
        Ok(self.roles.update(role, expected)?)
    }

    pub fn get(&self, role_id: RoleId) -> Result<Option<Role>, RegistryError> {
        Ok(self.roles.by_id(role_id)?)
    }

    pub fn by_name(&self, name: &str) -> Result<Option<Role>, RegistryError> {
        Ok(self.roles.by_name(name)?)
    }

    pub fn list(&self) -> Result<Vec<Role>, RegistryError> {
        let mut roles = self.roles.list()?;
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    fn load(&self, role_id: RoleId) -> Result<Role, RegistryError> {
        self.roles
            .by_id(role_id)?
            .ok_or(RegistryError::UnknownRole(role_id))
    }

    fn ensure_system_guard(&self, actor: &Principal, role: &Role) -> Result<(), RegistryError> {
        if role.is_system && !actor.bypasses_permission_checks() {
            return Err(RegistryError::SystemRole(role.name.clone()));
        }
        Ok(())
    }

    fn ensure_in_catalog(&self, id: &PermissionId) -> Result<(), RegistryError> {
        if self.permissions.get(id)?.is_none() {
            return Err(RegistryError::UnknownPermission(id.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::PermissionDef;
    use crate::testutil::{TestPerms, TestRoles, TestUsers};
    use crate::user::User;
    use chrono::Utc;
    use std::sync::Arc;

    struct Fixture {
        registry: RoleRegistry<Arc<TestRoles>, Arc<TestUsers>, Arc<TestPerms>>,
        users: Arc<TestUsers>,
    }

    fn fixture() -> Fixture {
        let roles = Arc::new(TestRoles::default());
        let users = Arc::new(TestUsers::default());
        let perms = Arc::new(TestPerms::default());

        for id in ["posts.read", "posts.create", "posts.manage"] {
            perms
                .insert(PermissionDef::new(PermissionId::parse(id).unwrap()))
                .unwrap();
        }

        Fixture {
            registry: RoleRegistry::new(roles, users.clone(), perms),
            users,
        }
    }

    fn perm(s: &'static str) -> PermissionId {
        PermissionId::from_static(s)
    }

    fn superuser() -> Principal {
        let mut role = Role::new("administrator");
        role.bypasses_permission_checks = true;
        let user = User::new("root@example.com", "hash", role.id, Utc::now());
        Principal::assemble(&user, Some(role)).unwrap()
    }

    fn staff() -> Principal {
        let role = Role::new("staff");
        let user = User::new("staff@example.com", "hash", role.id, Utc::now());
        Principal::assemble(&user, Some(role)).unwrap()
    }

    #[test]
    fn create_checks_name_and_catalog_membership() {
        let f = fixture();

        let role = f
            .registry
            .create(&staff(), NewRole::named("editor").with_permissions([perm("posts.read")]))
            .unwrap();
        assert_eq!(role.permissions, vec![perm("posts.read")]);

        assert!(matches!(
            f.registry.create(&staff(), NewRole::named("  ")),
            Err(RegistryError::InvalidName(_))
        ));
        assert!(matches!(
            f.registry.create(&staff(), NewRole::named("editor")),
            Err(RegistryError::DuplicateName(_))
        ));
        assert!(matches!(
            f.registry
                .create(&staff(), NewRole::named("ghost").with_permissions([perm("posts.vanish")])),
            Err(RegistryError::UnknownPermission(_))
        ));
    }

    #[test]
    fn privileged_role_creation_requires_bypass_actor() {
        let f = fixture();

        let mut bypass_spec = NewRole::named("shadow");
        bypass_spec.bypasses_permission_checks = true;
        assert!(matches!(
            f.registry.create(&staff(), bypass_spec.clone()),
            Err(RegistryError::PrivilegedRole)
        ));

        let role = f.registry.create(&superuser(), bypass_spec).unwrap();
        assert!(role.bypasses_permission_checks);
    }

    #[test]
    fn system_role_rename_requires_bypass_actor() {
        let f = fixture();
        let mut spec = NewRole::named("administrator");
        spec.is_system = true;
        let role = f.registry.create(&superuser(), spec).unwrap();

        assert!(matches!(
            f.registry.rename(&staff(), role.id, "root"),
            Err(RegistryError::SystemRole(_))
        ));
        let renamed = f.registry.rename(&superuser(), role.id, "root").unwrap();
        assert_eq!(renamed.name, "root");
    }

    #[test]
    fn system_role_membership_reduction_is_guarded() {
        let f = fixture();
        let mut spec = NewRole::named("administrator").with_permissions([perm("posts.read")]);
        spec.is_system = true;
        let role = f.registry.create(&superuser(), spec).unwrap();

        // Growing is open; reducing needs the bypass capability.
        f.registry
            .add_permission(role.id, perm("posts.create"))
            .unwrap();
        assert!(matches!(
            f.registry
                .remove_permission(&staff(), role.id, &perm("posts.read")),
            Err(RegistryError::SystemRole(_))
        ));

        let reduced = f
            .registry
            .remove_permission(&superuser(), role.id, &perm("posts.read"))
            .unwrap();
        assert!(!reduced.has_permission(&perm("posts.read")));
    }

    #[test]
    fn held_role_cannot_be_deleted() {
        let f = fixture();
        let role = f.registry.create(&staff(), NewRole::named("editor")).unwrap();
        f.users
            .insert(User::new("held@example.com", "hash", role.id, Utc::now()))
            .unwrap();

        assert!(matches!(
            f.registry.delete(&superuser(), role.id),
            Err(RegistryError::StillAssigned(_))
        ));
    }

    #[test]
    fn unheld_role_is_deleted() {
        let f = fixture();
        let role = f.registry.create(&staff(), NewRole::named("ephemeral")).unwrap();

        f.registry.delete(&staff(), role.id).unwrap();
        assert!(f.registry.get(role.id).unwrap().is_none());
    }

    #[test]
    fn add_permission_deduplicates_membership() {
        let f = fixture();
        let role = f
            .registry
            .create(&staff(), NewRole::named("editor").with_permissions([perm("posts.read")]))
            .unwrap();

        let updated = f.registry.add_permission(role.id, perm("posts.read")).unwrap();
        assert_eq!(updated.permissions.len(), 1);
    }

    #[test]
    fn set_active_is_a_display_flag() {
        let f = fixture();
        let role = f.registry.create(&staff(), NewRole::named("editor")).unwrap();

        let updated = f.registry.set_active(role.id, false).unwrap();
        assert!(!updated.is_active);
    }
}
