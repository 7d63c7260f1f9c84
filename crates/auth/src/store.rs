//! Repository contracts consumed by the engine.
//!
//! The engine is storage-agnostic: every decision is computed from data loaded
//! through these traits for the current request, with no long-lived cache of
//! resolved permission sets. Per-entity write serialization is the store's
//! responsibility; version-checked writes (`ExpectedVersion`) are how the
//! in-memory and future SQL backends provide it.

use std::sync::Arc;

use thiserror::Error;

use castellan_core::{ExpectedVersion, RoleId, UserId};

use crate::lockout::SecurityState;
use crate::permission::{PermissionDef, PermissionId};
use crate::role::Role;
use crate::user::User;

/// Store operation error.
///
/// These are **infrastructure errors** (contention, duplicates, backend
/// faults) as opposed to domain errors (validation, lifecycle rules).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// User accounts, loaded with role reference and overrides populated.
pub trait UserStore: Send + Sync {
    fn by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    fn by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Insert a new user. Rejects duplicate ids and emails.
    fn insert(&self, user: User) -> Result<User, StoreError>;

    /// Replace a user record, checking the expected version first.
    ///
    /// The stored version is bumped on success; the updated record is
    /// returned.
    fn update(&self, user: User, expected: ExpectedVersion) -> Result<User, StoreError>;

    /// Persist only the security fields (attempt counter, lock timestamp).
    ///
    /// Kept separate from `update` so lockout transitions stay a narrow,
    /// version-checked read-then-write: two concurrent failed logins cannot
    /// both increment from the same stale counter.
    fn update_security(
        &self,
        id: UserId,
        expected: ExpectedVersion,
        state: SecurityState,
    ) -> Result<User, StoreError>;

    fn list(&self) -> Result<Vec<User>, StoreError>;

    fn count(&self) -> Result<u64, StoreError>;

    /// Whether any user currently holds the role (role deletion guard).
    fn any_with_role(&self, role_id: RoleId) -> Result<bool, StoreError>;

    /// Whether any user's overrides reference the permission (catalog
    /// deletion guard).
    fn any_override_references(&self, id: &PermissionId) -> Result<bool, StoreError>;
}

/// Roles, loaded with their permission membership populated.
pub trait RoleStore: Send + Sync {
    fn by_id(&self, id: RoleId) -> Result<Option<Role>, StoreError>;

    fn by_name(&self, name: &str) -> Result<Option<Role>, StoreError>;

    /// Insert a new role. Rejects duplicate ids and names.
    fn insert(&self, role: Role) -> Result<Role, StoreError>;

    /// Replace a role record, checking the expected version first.
    fn update(&self, role: Role, expected: ExpectedVersion) -> Result<Role, StoreError>;

    fn remove(&self, id: RoleId) -> Result<(), StoreError>;

    fn list(&self) -> Result<Vec<Role>, StoreError>;

    /// Whether any role's membership references the permission (catalog
    /// deletion guard).
    fn any_references(&self, id: &PermissionId) -> Result<bool, StoreError>;
}

/// The permission catalog.
pub trait PermissionStore: Send + Sync {
    fn get(&self, id: &PermissionId) -> Result<Option<PermissionDef>, StoreError>;

    /// Insert a new catalog entry. Rejects duplicate identifiers.
    fn insert(&self, def: PermissionDef) -> Result<PermissionDef, StoreError>;

    fn remove(&self, id: &PermissionId) -> Result<(), StoreError>;

    fn list(&self) -> Result<Vec<PermissionDef>, StoreError>;
}

impl<S> UserStore for Arc<S>
where
    S: UserStore + ?Sized,
{
    fn by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        (**self).by_id(id)
    }

    fn by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        (**self).by_email(email)
    }

    fn insert(&self, user: User) -> Result<User, StoreError> {
        (**self).insert(user)
    }

    fn update(&self, user: User, expected: ExpectedVersion) -> Result<User, StoreError> {
        (**self).update(user, expected)
    }

    fn update_security(
        &self,
        id: UserId,
        expected: ExpectedVersion,
        state: SecurityState,
    ) -> Result<User, StoreError> {
        (**self).update_security(id, expected, state)
    }

    fn list(&self) -> Result<Vec<User>, StoreError> {
        (**self).list()
    }

    fn count(&self) -> Result<u64, StoreError> {
        (**self).count()
    }

    fn any_with_role(&self, role_id: RoleId) -> Result<bool, StoreError> {
        (**self).any_with_role(role_id)
    }

    fn any_override_references(&self, id: &PermissionId) -> Result<bool, StoreError> {
        (**self).any_override_references(id)
    }
}

impl<S> RoleStore for Arc<S>
where
    S: RoleStore + ?Sized,
{
    fn by_id(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        (**self).by_id(id)
    }

    fn by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        (**self).by_name(name)
    }

    fn insert(&self, role: Role) -> Result<Role, StoreError> {
        (**self).insert(role)
    }

    fn update(&self, role: Role, expected: ExpectedVersion) -> Result<Role, StoreError> {
        (**self).update(role, expected)
    }

    fn remove(&self, id: RoleId) -> Result<(), StoreError> {
        (**self).remove(id)
    }

    fn list(&self) -> Result<Vec<Role>, StoreError> {
        (**self).list()
    }

    fn any_references(&self, id: &PermissionId) -> Result<bool, StoreError> {
        (**self).any_references(id)
    }
}

impl<S> PermissionStore for Arc<S>
where
    S: PermissionStore + ?Sized,
{
    fn get(&self, id: &PermissionId) -> Result<Option<PermissionDef>, StoreError> {
        (**self).get(id)
    }

    fn insert(&self, def: PermissionDef) -> Result<PermissionDef, StoreError> {
        (**self).insert(def)
    }

    fn remove(&self, id: &PermissionId) -> Result<(), StoreError> {
        (**self).remove(id)
    }

    fn list(&self) -> Result<Vec<PermissionDef>, StoreError> {
        (**self).list()
    }
}
