use std::collections::HashMap;
use std::sync::RwLock;

use castellan_auth::{PermissionId, Role, RoleStore, StoreError};
use castellan_core::{ExpectedVersion, RoleId};

use super::poisoned;

/// In-memory role store with version-checked writes.
#[derive(Debug, Default)]
pub struct InMemoryRoleStore {
    inner: RwLock<HashMap<RoleId, Role>>,
}

impl InMemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoleStore for InMemoryRoleStore {
    fn by_id(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        Ok(self.inner.read().map_err(poisoned)?.get(&id).cloned())
    }

    fn by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        Ok(self
            .inner
            .read()
            .map_err(poisoned)?
            .values()
            .find(|r| r.name == name)
            .cloned())
    }

    fn insert(&self, role: Role) -> Result<Role, StoreError> {
        let mut roles = self.inner.write().map_err(poisoned)?;
        if roles.contains_key(&role.id) {
            return Err(StoreError::Duplicate(format!("role id {}", role.id)));
        }
        if roles.values().any(|r| r.name == role.name) {
            return Err(StoreError::Duplicate(format!("role name {}", role.name)));
        }
        roles.insert(role.id, role.clone());
        Ok(role)
    }

    fn update(&self, mut role: Role, expected: ExpectedVersion) -> Result<Role, StoreError> {
        let mut roles = self.inner.write().map_err(poisoned)?;
        let current = roles
            .get(&role.id)
            .ok_or_else(|| StoreError::Backend(format!("unknown role {}", role.id)))?;
        if !expected.matches(current.version) {
            return Err(StoreError::Conflict(format!(
                "role {} at version {}, expected {expected:?}",
                role.id, current.version
            )));
        }
        role.version = current.version + 1;
        roles.insert(role.id, role.clone());
        Ok(role)
    }

    fn remove(&self, id: RoleId) -> Result<(), StoreError> {
        self.inner.write().map_err(poisoned)?.remove(&id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<Role>, StoreError> {
        Ok(self
            .inner
            .read()
            .map_err(poisoned)?
            .values()
            .cloned()
            .collect())
    }

    fn any_references(&self, id: &PermissionId) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .read()
            .map_err(poisoned)?
            .values()
            .any(|r| r.references(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_rejects_duplicate_name() {
        let store = InMemoryRoleStore::new();
        store.insert(Role::new("editor")).unwrap();

        assert!(matches!(
            store.insert(Role::new("editor")),
            Err(StoreError::Duplicate(_))
        ));
    }

    #[test]
    fn concurrent_membership_edits_serialize() {
        let store = InMemoryRoleStore::new();
        let stored = store.insert(Role::new("editor")).unwrap();

        // Two sessions load the same snapshot; one adds, one removes.
        let mut adder = stored.clone();
        adder.add_permission(PermissionId::from_static("posts.read"));
        store
            .update(adder, ExpectedVersion::Exact(stored.version))
            .unwrap();

        let mut remover = stored.clone();
        remover.remove_permission(&PermissionId::from_static("posts.read"));
        assert!(matches!(
            store.update(remover, ExpectedVersion::Exact(stored.version)),
            Err(StoreError::Conflict(_))
        ));
    }
}
