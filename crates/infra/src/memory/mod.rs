//! In-memory store implementations.
//!
//! The development/test default: `RwLock`-guarded maps with version-checked
//! writes, so the optimistic-concurrency contract matches what a SQL backend
//! would provide.

mod permissions;
mod roles;
mod users;

pub use permissions::InMemoryPermissionStore;
pub use roles::InMemoryRoleStore;
pub use users::InMemoryUserStore;

/// A poisoned lock means a writer panicked mid-mutation; surface it as a
/// backend fault instead of cascading the panic.
pub(crate) fn poisoned<E>(_: E) -> castellan_auth::StoreError {
    castellan_auth::StoreError::Backend("lock poisoned".to_string())
}
