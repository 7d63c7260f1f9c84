//! Effective-permission resolution.
//!
//! The effective set is computed fresh for each request and passed through
//! the call chain as a first-class value; nothing here caches across
//! invocations, so role and override edits take effect immediately for every
//! user holding the role.

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;

use castellan_core::{RoleId, UserId};

use crate::overrides::PermissionOverrides;
use crate::permission::PermissionId;
use crate::role::Role;
use crate::user::User;

/// Data-integrity failure: references that must hold did not.
///
/// These indicate a bug or corrupted data, not a deny: callers log them
/// loudly and surface an internal failure rather than treating them as
/// "permission denied".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error("user {user_id} resolves to no loaded role (assigned role {role_id})")]
    MissingRole { user_id: UserId, role_id: RoleId },

    #[error("loaded role {loaded} does not match user {user_id}'s assigned role {expected}")]
    RoleMismatch {
        user_id: UserId,
        expected: RoleId,
        loaded: RoleId,
    },
}

/// A fully loaded principal, ready for authorization decisions.
///
/// Construction goes through [`assemble`](Self::assemble), which refuses a
/// principal whose role failed to load; a user without a role is a data
/// integrity bug, never an empty permission set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub email: String,
    pub role: Role,
    pub overrides: PermissionOverrides,
}

impl Principal {
    pub fn assemble(user: &User, role: Option<Role>) -> Result<Self, ConsistencyError> {
        let role = role.ok_or(ConsistencyError::MissingRole {
            user_id: user.id,
            role_id: user.role_id,
        })?;

        if role.id != user.role_id {
            return Err(ConsistencyError::RoleMismatch {
                user_id: user.id,
                expected: user.role_id,
                loaded: role.id,
            });
        }

        Ok(Self {
            user_id: user.id,
            email: user.email.clone(),
            role,
            overrides: user.overrides.clone(),
        })
    }

    pub fn role_name(&self) -> &str {
        &self.role.name
    }

    /// Whether the principal's role carries the bypass capability.
    pub fn bypasses_permission_checks(&self) -> bool {
        self.role.bypasses_permission_checks
    }

    /// Compute the effective permission set:
    ///
    /// ```text
    /// effective = (role.permissions ∪ granted) \ revoked
    /// ```
    ///
    /// Union before subtraction: a revocation always wins, over both role
    /// membership and an explicit grant. Deterministic and side-effect-free.
    pub fn effective_permissions(&self) -> EffectivePermissions {
        let mut set: HashSet<PermissionId> = self.role.permissions.iter().cloned().collect();
        set.extend(self.overrides.granted().iter().cloned());
        for revoked in self.overrides.revoked() {
            set.remove(revoked);
        }
        EffectivePermissions(set)
    }

    /// Membership test without materializing the full set.
    ///
    /// Short-circuit order mirrors the formula: a revocation wins
    /// immediately; otherwise a grant or role membership admits.
    pub fn has_permission(&self, id: &PermissionId) -> bool {
        if self.overrides.is_revoked(id) {
            return false;
        }
        self.overrides.is_granted(id) || self.role.has_permission(id)
    }
}

/// The resolved permission set for one principal, valid for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EffectivePermissions(HashSet<PermissionId>);

impl EffectivePermissions {
    pub fn contains(&self, id: &PermissionId) -> bool {
        self.0.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sorted copy for display and audit payloads.
    pub fn to_sorted_vec(&self) -> Vec<PermissionId> {
        let mut v: Vec<PermissionId> = self.0.iter().cloned().collect();
        v.sort();
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn perm(s: &'static str) -> PermissionId {
        PermissionId::from_static(s)
    }

    fn editor_role() -> Role {
        let mut role = Role::new("editor");
        role.add_permission(perm("posts.create"));
        role.add_permission(perm("posts.read"));
        role
    }

    fn editor_role_with_id(id: castellan_core::RoleId) -> Role {
        let mut role = editor_role();
        role.id = id;
        role
    }

    fn user_with_role(role: &Role) -> User {
        User::new("alice@example.com", "hash", role.id, Utc::now())
    }

    #[test]
    fn effective_is_role_union_grants_minus_revokes() {
        // Editor = {posts.create, posts.read}; granted {posts.delete}.
        let role = editor_role();
        let mut user = user_with_role(&role);
        user.overrides.grant(perm("posts.delete"));

        let principal = Principal::assemble(&user, Some(role)).unwrap();
        assert_eq!(
            principal.effective_permissions().to_sorted_vec(),
            vec![perm("posts.create"), perm("posts.delete"), perm("posts.read")]
        );

        // Revoke a role permission: it disappears from the effective set.
        user.overrides.revoke(perm("posts.read"));
        let principal =
            Principal::assemble(&user, Some(editor_role_with_id(user.role_id))).unwrap();
        assert_eq!(
            principal.effective_permissions().to_sorted_vec(),
            vec![perm("posts.create"), perm("posts.delete")]
        );
    }

    #[test]
    fn revoke_dominates_grant_in_either_order() {
        let role = editor_role();

        let mut first = user_with_role(&role);
        first.overrides.grant(perm("posts.delete"));
        first.overrides.revoke(perm("posts.delete"));

        let mut second = user_with_role(&role);
        second.overrides.revoke(perm("posts.delete"));
        second.overrides.grant(perm("posts.delete"));

        let p1 = Principal::assemble(&first, Some(editor_role_with_id(first.role_id))).unwrap();
        assert!(!p1.effective_permissions().contains(&perm("posts.delete")));
        assert!(!p1.has_permission(&perm("posts.delete")));

        // Steady state never holds a permission in both sets, so the later
        // operation wins: grant-after-revoke resolves to granted.
        let p2 = Principal::assemble(&second, Some(editor_role_with_id(second.role_id))).unwrap();
        assert!(p2.effective_permissions().contains(&perm("posts.delete")));
    }

    #[test]
    fn zero_permission_role_resolves_to_grants_minus_revokes() {
        let role = Role::new("bare");
        let mut user = user_with_role(&role);
        user.overrides.grant(perm("posts.read"));
        user.overrides.grant(perm("posts.create"));
        user.overrides.revoke(perm("posts.create"));

        let principal = Principal::assemble(&user, Some(role)).unwrap();
        let effective = principal.effective_permissions();

        assert_eq!(effective.to_sorted_vec(), vec![perm("posts.read")]);
    }

    #[test]
    fn missing_role_is_an_error_not_an_empty_set() {
        let role = editor_role();
        let user = user_with_role(&role);

        let err = Principal::assemble(&user, None).unwrap_err();
        assert!(matches!(err, ConsistencyError::MissingRole { .. }));
    }

    #[test]
    fn mismatched_role_is_rejected() {
        let role = editor_role();
        let user = user_with_role(&role);
        let other = Role::new("viewer");

        let err = Principal::assemble(&user, Some(other)).unwrap_err();
        assert!(matches!(err, ConsistencyError::RoleMismatch { .. }));
    }

    #[test]
    fn resolution_is_idempotent() {
        let role = editor_role();
        let mut user = user_with_role(&role);
        user.overrides.grant(perm("posts.delete"));
        user.overrides.revoke(perm("posts.read"));

        let principal = Principal::assemble(&user, Some(role)).unwrap();
        let first = principal.effective_permissions();
        let second = principal.effective_permissions();

        assert_eq!(first, second);
    }

    #[test]
    fn inactive_role_still_grants_permissions() {
        // Deliberate product behavior: is_active filters display surfaces
        // only and has no effect on resolution.
        let mut role = editor_role();
        role.is_active = false;
        let user = user_with_role(&role);

        let principal = Principal::assemble(&user, Some(role)).unwrap();
        assert!(principal.has_permission(&perm("posts.read")));
        assert!(
            principal
                .effective_permissions()
                .contains(&perm("posts.create"))
        );
    }

    #[test]
    fn has_permission_agrees_with_effective_set() {
        let role = editor_role();
        let mut user = user_with_role(&role);
        user.overrides.grant(perm("posts.delete"));
        user.overrides.revoke(perm("posts.read"));

        let principal = Principal::assemble(&user, Some(role)).unwrap();
        let effective = principal.effective_permissions();

        for id in ["posts.create", "posts.read", "posts.delete", "users.manage"] {
            let id = PermissionId::parse(id).unwrap();
            assert_eq!(principal.has_permission(&id), effective.contains(&id));
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn perm_id() -> impl Strategy<Value = PermissionId> {
            // Small alphabet so the role/grant/revoke sets overlap often.
            ("[a-e]{1,3}", "[a-e]{1,3}")
                .prop_map(|(r, a)| PermissionId::parse(format!("{r}.{a}")).unwrap())
        }

        fn perm_set() -> impl Strategy<Value = Vec<PermissionId>> {
            proptest::collection::vec(perm_id(), 0..8)
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: the resolved set is exactly
            /// (role ∪ granted) \ revoked, and `has_permission` agrees with
            /// it for every identifier involved.
            #[test]
            fn formula_holds(
                role_perms in perm_set(),
                granted in perm_set(),
                revoked in perm_set(),
            ) {
                let mut role = Role::new("generated");
                for p in &role_perms {
                    role.add_permission(p.clone());
                }

                let mut user = User::new("p@example.com", "hash", role.id, Utc::now());
                for p in &granted {
                    user.overrides.grant(p.clone());
                }
                for p in &revoked {
                    user.overrides.revoke(p.clone());
                }

                let principal = Principal::assemble(&user, Some(role)).unwrap();
                let effective = principal.effective_permissions();

                let mut expected: std::collections::HashSet<PermissionId> =
                    role_perms.iter().cloned().collect();
                // The overrides were applied in grant-then-revoke order, so
                // a permission in both input lists ends up revoked.
                for p in &granted {
                    if !revoked.contains(p) {
                        expected.insert(p.clone());
                    }
                }
                for p in &revoked {
                    expected.remove(p);
                }

                let actual: std::collections::HashSet<PermissionId> =
                    effective.iter().cloned().collect();
                prop_assert_eq!(&actual, &expected);

                for p in role_perms.iter().chain(&granted).chain(&revoked) {
                    prop_assert_eq!(principal.has_permission(p), actual.contains(p));
                }

                // Idempotence: a second resolution is identical.
                prop_assert_eq!(principal.effective_permissions(), effective);
            }
        }
    }
}
