use std::collections::HashMap;
use std::sync::RwLock;

use castellan_auth::{PermissionId, SecurityState, StoreError, User, UserStore};
use castellan_core::{ExpectedVersion, RoleId, UserId};

use super::poisoned;

/// In-memory user store.
///
/// Writes hold the lock across the version check and the mutation, so
/// per-entity read-then-write cycles serialize exactly like a row-level
/// locked SQL update.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    inner: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for InMemoryUserStore {
    fn by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().map_err(poisoned)?.get(&id).cloned())
    }

    fn by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .inner
            .read()
            .map_err(poisoned)?
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    fn insert(&self, user: User) -> Result<User, StoreError> {
        let mut users = self.inner.write().map_err(poisoned)?;
        if users.contains_key(&user.id) {
            return Err(StoreError::Duplicate(format!("user id {}", user.id)));
        }
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(format!("email {}", user.email)));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    fn update(&self, mut user: User, expected: ExpectedVersion) -> Result<User, StoreError> {
        let mut users = self.inner.write().map_err(poisoned)?;
        let current = users
            .get(&user.id)
            .ok_or_else(|| StoreError::Backend(format!("unknown user {}", user.id)))?;
        if !expected.matches(current.version) {
            return Err(StoreError::Conflict(format!(
                "user {} at version {}, expected {expected:?}",
                user.id, current.version
            )));
        }
        user.version = current.version + 1;
        users.insert(user.id, user.clone());
        Ok(user)
    }

    fn update_security(
        &self,
        id: UserId,
        expected: ExpectedVersion,
        state: SecurityState,
    ) -> Result<User, StoreError> {
        let mut users = self.inner.write().map_err(poisoned)?;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("unknown user {id}")))?;
        if !expected.matches(user.version) {
            return Err(StoreError::Conflict(format!(
                "user {id} at version {}, expected {expected:?}",
                user.version
            )));
        }
        user.security = state;
        user.version += 1;
        Ok(user.clone())
    }

    fn list(&self) -> Result<Vec<User>, StoreError> {
        Ok(self
            .inner
            .read()
            .map_err(poisoned)?
            .values()
            .cloned()
            .collect())
    }

    fn count(&self) -> Result<u64, StoreError> {
        Ok(self.inner.read().map_err(poisoned)?.len() as u64)
    }

    fn any_with_role(&self, role_id: RoleId) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .read()
            .map_err(poisoned)?
            .values()
            .any(|u| u.role_id == role_id))
    }

    fn any_override_references(&self, id: &PermissionId) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .read()
            .map_err(poisoned)?
            .values()
            .any(|u| u.overrides.references(id)))
    }
}
