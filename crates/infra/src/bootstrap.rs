//! Startup seeding: built-in catalog entries and system roles.

use castellan_auth::{PermissionStore, Role, RoleStore, StoreError, builtin};

/// The two roles every deployment starts with.
pub struct SeededRoles {
    /// System role with the bypass capability; assigned to the first
    /// registered user. Carries no permission list: the capability flag is
    /// what admits it everywhere.
    pub administrator: Role,
    /// Default role for every later registration.
    pub member: Role,
}

pub const ADMINISTRATOR_ROLE: &str = "administrator";
pub const MEMBER_ROLE: &str = "member";

/// Seed the built-in catalog and system roles. Idempotent: existing entries
/// are left untouched.
pub fn seed<P, R>(permissions: &P, roles: &R) -> Result<SeededRoles, StoreError>
where
    P: PermissionStore,
    R: RoleStore,
{
    for def in builtin::all() {
        if permissions.get(&def.id)?.is_none() {
            permissions.insert(def)?;
        }
    }

    let administrator = match roles.by_name(ADMINISTRATOR_ROLE)? {
        Some(role) => role,
        None => {
            let mut role = Role::new(ADMINISTRATOR_ROLE);
            role.is_system = true;
            role.bypasses_permission_checks = true;
            let role = roles.insert(role)?;
            tracing::info!(role_id = %role.id, "seeded administrator role");
            role
        }
    };

    let member = match roles.by_name(MEMBER_ROLE)? {
        Some(role) => role,
        None => {
            let mut role = Role::new(MEMBER_ROLE);
            role.is_system = true;
            role.add_permission(builtin::POSTS_READ);
            let role = roles.insert(role)?;
            tracing::info!(role_id = %role.id, "seeded member role");
            role
        }
    };

    Ok(SeededRoles {
        administrator,
        member,
    })
}
