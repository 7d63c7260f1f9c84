//! Permission catalog: the set of atomic permission identifiers.
//!
//! Entries are created by administrators and deleted only when nothing
//! references them; there is no update operation, because a permission is
//! immutable once a role or override points at it.

use thiserror::Error;

use crate::permission::{MalformedPermission, PermissionDef, PermissionId};
use crate::resolver::Principal;
use crate::store::{PermissionStore, RoleStore, StoreError, UserStore};

/// Built-in permission identifiers backing the admin surface.
pub mod builtin {
    use crate::permission::{PermissionDef, PermissionId};

    pub const USERS_READ: PermissionId = PermissionId::from_static("users.read");
    pub const USERS_MANAGE: PermissionId = PermissionId::from_static("users.manage");
    pub const ROLES_READ: PermissionId = PermissionId::from_static("roles.read");
    pub const ROLES_MANAGE: PermissionId = PermissionId::from_static("roles.manage");
    pub const PERMISSIONS_READ: PermissionId = PermissionId::from_static("permissions.read");
    pub const PERMISSIONS_MANAGE: PermissionId = PermissionId::from_static("permissions.manage");
    pub const POSTS_READ: PermissionId = PermissionId::from_static("posts.read");
    pub const POSTS_MANAGE: PermissionId = PermissionId::from_static("posts.manage");

    /// The full built-in catalog, seeded at startup.
    pub fn all() -> Vec<PermissionDef> {
        vec![
            PermissionDef::system(USERS_READ, "View user accounts"),
            PermissionDef::system(USERS_MANAGE, "Manage user accounts, roles and overrides"),
            PermissionDef::system(ROLES_READ, "View roles"),
            PermissionDef::system(ROLES_MANAGE, "Create and modify roles"),
            PermissionDef::system(PERMISSIONS_READ, "View the permission catalog"),
            PermissionDef::system(PERMISSIONS_MANAGE, "Modify the permission catalog"),
            PermissionDef::system(POSTS_READ, "View content"),
            PermissionDef::system(POSTS_MANAGE, "Manage any content"),
        ]
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Malformed(#[from] MalformedPermission),

    #[error("permission '{0}' already exists")]
    Duplicate(PermissionId),

    #[error("permission '{0}' not found")]
    Unknown(PermissionId),

    #[error("permission '{0}' is still referenced by a role or user override")]
    InUse(PermissionId),

    #[error("system permission '{0}' may only be deleted by a bypass-capable role")]
    SystemPermission(PermissionId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Catalog operations over the store contracts.
pub struct PermissionCatalog<P, R, U> {
    permissions: P,
    roles: R,
    users: U,
}

impl<P, R, U> PermissionCatalog<P, R, U>
where
    P: PermissionStore,
    R: RoleStore,
    U: UserStore,
{
    pub fn new(permissions: P, roles: R, users: U) -> Self {
        Self {
            permissions,
            roles,
            users,
        }
    }

    /// Define a new permission.
    pub fn define(
        &self,
        id: &str,
        description: Option<String>,
        is_system: bool,
    ) -> Result<PermissionDef, CatalogError> {
        let id = PermissionId::parse(id)?;
        if self.permissions.get(&id)?.is_some() {
            return Err(CatalogError::Duplicate(id));
        }

        let def = PermissionDef {
            id: id.clone(),
            description,
            is_system,
        };
        let def = self.permissions.insert(def)?;
        tracing::info!(permission = %id, "permission defined");
        Ok(def)
    }

    /// Delete a permission.
    ///
    /// Refused while any role or user override references it; system
    /// permissions additionally require a bypass-capable actor.
    pub fn remove(&self, actor: &Principal, id: &PermissionId) -> Result<(), CatalogError> {
        let def = self
            .permissions
            .get(id)?
            .ok_or_else(|| CatalogError::Unknown(id.clone()))?;

        if def.is_system && !actor.bypasses_permission_checks() {
            return Err(CatalogError::SystemPermission(id.clone()));
        }

        if self.roles.any_references(id)? || self.users.any_override_references(id)? {
            return Err(CatalogError::InUse(id.clone()));
        }

        self.permissions.remove(id)?;
        tracing::info!(permission = %id, actor = %actor.user_id, "permission deleted");
        Ok(())
    }

    pub fn get(&self, id: &PermissionId) -> Result<Option<PermissionDef>, CatalogError> {
        Ok(self.permissions.get(id)?)
    }

    pub fn list(&self) -> Result<Vec<PermissionDef>, CatalogError> {
        let mut defs = self.permissions.list()?;
        defs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(defs)
    }
}
