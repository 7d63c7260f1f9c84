//! In-memory store implementations shared by this crate's unit tests.
//!
//! These mirror the production stores in `castellan-infra`, including the
//! version-checked writes, so lockout and registry tests exercise realistic
//! concurrency behavior.

use std::collections::HashMap;
use std::sync::RwLock;

use castellan_core::{ExpectedVersion, RoleId, UserId};

use crate::lockout::SecurityState;
use crate::permission::{PermissionDef, PermissionId};
use crate::role::Role;
use crate::store::{PermissionStore, RoleStore, StoreError, UserStore};
use crate::user::User;

#[derive(Default)]
pub struct TestUsers(RwLock<HashMap<UserId, User>>);

impl UserStore for TestUsers {
    fn by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.0.read().unwrap().get(&id).cloned())
    }

    fn by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .0
            .read()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    fn insert(&self, user: User) -> Result<User, StoreError> {
        let mut users = self.0.write().unwrap();
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
        let mut users = self.0.write().unwrap();
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
        let mut users = self.0.write().unwrap();
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
        Ok(self.0.read().unwrap().values().cloned().collect())
    }

    fn count(&self) -> Result<u64, StoreError> {
        Ok(self.0.read().unwrap().len() as u64)
    }

    fn any_with_role(&self, role_id: RoleId) -> Result<bool, StoreError> {
        Ok(self
            .0
            .read()
            .unwrap()
            .values()
            .any(|u| u.role_id == role_id))
    }

    fn any_override_references(&self, id: &PermissionId) -> Result<bool, StoreError> {
        Ok(self
            .0
            .read()
            .unwrap()
            .values()
            .any(|u| u.overrides.references(id)))
    }
}

#[derive(Default)]
pub struct TestRoles(RwLock<HashMap<RoleId, Role>>);

impl RoleStore for TestRoles {
    fn by_id(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        Ok(self.0.read().unwrap().get(&id).cloned())
    }

    fn by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        Ok(self
            .0
            .read()
            .unwrap()
            .values()
            .find(|r| r.name == name)
            .cloned())
    }

    fn insert(&self, role: Role) -> Result<Role, StoreError> {
        let mut roles = self.0.write().unwrap();
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
        let mut roles = self.0.write().unwrap();
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
        self.0.write().unwrap().remove(&id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<Role>, StoreError> {
        Ok(self.0.read().unwrap().values().cloned().collect())
    }

    fn any_references(&self, id: &PermissionId) -> Result<bool, StoreError> {
        Ok(self.0.read().unwrap().values().any(|r| r.references(id)))
    }
}

#[derive(Default)]
pub struct TestPerms(RwLock<HashMap<PermissionId, PermissionDef>>);

impl PermissionStore for TestPerms {
    fn get(&self, id: &PermissionId) -> Result<Option<PermissionDef>, StoreError> {
        Ok(self.0.read().unwrap().get(id).cloned())
    }

    fn insert(&self, def: PermissionDef) -> Result<PermissionDef, StoreError> {
        let mut defs = self.0.write().unwrap();
        if defs.contains_key(&def.id) {
            return Err(StoreError::Duplicate(format!("permission {}", def.id)));
        }
        defs.insert(def.id.clone(), def.clone());
        Ok(def)
    }

    fn remove(&self, id: &PermissionId) -> Result<(), StoreError> {
        self.0.write().unwrap().remove(id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<PermissionDef>, StoreError> {
        Ok(self.0.read().unwrap().values().cloned().collect())
    }
}
