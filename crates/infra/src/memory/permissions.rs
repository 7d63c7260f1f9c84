use std::collections::HashMap;
use std::sync::RwLock;

use castellan_auth::{PermissionDef, PermissionId, PermissionStore, StoreError};

use super::poisoned;

/// In-memory permission catalog store.
#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    inner: RwLock<HashMap<PermissionId, PermissionDef>>,
}

impl InMemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PermissionStore for InMemoryPermissionStore {
    fn get(&self, id: &PermissionId) -> Result<Option<PermissionDef>, StoreError> {
        Ok(self.inner.read().map_err(poisoned)?.get(id).cloned())
    }

    fn insert(&self, def: PermissionDef) -> Result<PermissionDef, StoreError> {
        let mut defs = self.inner.write().map_err(poisoned)?;
        if defs.contains_key(&def.id) {
            return Err(StoreError::Duplicate(format!("permission {}", def.id)));
        }
        defs.insert(def.id.clone(), def.clone());
        Ok(def)
    }

    fn remove(&self, id: &PermissionId) -> Result<(), StoreError> {
        self.inner.write().map_err(poisoned)?.remove(id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<PermissionDef>, StoreError> {
        Ok(self
            .inner
            .read()
            .map_err(poisoned)?
            .values()
            .cloned()
            .collect())
    }
}
