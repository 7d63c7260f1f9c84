use serde::{Deserialize, Serialize};

use crate::permission::PermissionId;

/// Per-user permission overrides layered on top of the assigned role.
///
/// `granted` adds permissions the role does not carry; `revoked` subtracts
/// permissions regardless of where they came from. The two sets are disjoint:
/// [`grant`](Self::grant) and [`revoke`](Self::revoke) atomically clear the
/// complementary entry, so callers can never observe a permission in both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverrides {
    granted: Vec<PermissionId>,
    revoked: Vec<PermissionId>,
}

impl PermissionOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a grant, clearing any standing revocation of the same permission.
    pub fn grant(&mut self, id: PermissionId) {
        self.revoked.retain(|p| p != &id);
        if !self.granted.contains(&id) {
            self.granted.push(id);
        }
    }

    /// Add a revocation, clearing any standing grant of the same permission.
    pub fn revoke(&mut self, id: PermissionId) {
        self.granted.retain(|p| p != &id);
        if !self.revoked.contains(&id) {
            self.revoked.push(id);
        }
    }

    /// Drop any override (grant or revoke) of the permission.
    pub fn clear(&mut self, id: &PermissionId) {
        self.granted.retain(|p| p != id);
        self.revoked.retain(|p| p != id);
    }

    pub fn granted(&self) -> &[PermissionId] {
        &self.granted
    }

    pub fn revoked(&self) -> &[PermissionId] {
        &self.revoked
    }

    pub fn is_granted(&self, id: &PermissionId) -> bool {
        self.granted.contains(id)
    }

    pub fn is_revoked(&self, id: &PermissionId) -> bool {
        self.revoked.contains(id)
    }

    /// Whether either set references the permission (catalog deletion guard).
    pub fn references(&self, id: &PermissionId) -> bool {
        self.is_granted(id) || self.is_revoked(id)
    }

    pub fn is_empty(&self) -> bool {
        self.granted.is_empty() && self.revoked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perm(s: &'static str) -> PermissionId {
        PermissionId::from_static(s)
    }

    #[test]
    fn grant_clears_standing_revocation() {
        let mut ov = PermissionOverrides::new();
        ov.revoke(perm("posts.read"));
        ov.grant(perm("posts.read"));

        assert!(ov.is_granted(&perm("posts.read")));
        assert!(!ov.is_revoked(&perm("posts.read")));
    }

    #[test]
    fn revoke_clears_standing_grant() {
        let mut ov = PermissionOverrides::new();
        ov.grant(perm("posts.read"));
        ov.revoke(perm("posts.read"));

        assert!(!ov.is_granted(&perm("posts.read")));
        assert!(ov.is_revoked(&perm("posts.read")));
    }

    #[test]
    fn grant_revoke_grant_round_trip() {
        let mut ov = PermissionOverrides::new();
        ov.grant(perm("posts.delete"));
        ov.revoke(perm("posts.delete"));
        ov.grant(perm("posts.delete"));

        assert!(ov.is_granted(&perm("posts.delete")));
        assert!(!ov.is_revoked(&perm("posts.delete")));
        assert_eq!(ov.granted().len(), 1);
    }

    #[test]
    fn operations_deduplicate() {
        let mut ov = PermissionOverrides::new();
        ov.grant(perm("posts.read"));
        ov.grant(perm("posts.read"));
        ov.revoke(perm("posts.write"));
        ov.revoke(perm("posts.write"));

        assert_eq!(ov.granted().len(), 1);
        assert_eq!(ov.revoked().len(), 1);
    }

    #[test]
    fn clear_drops_both_sides() {
        let mut ov = PermissionOverrides::new();
        ov.grant(perm("posts.read"));
        ov.revoke(perm("posts.write"));
        ov.clear(&perm("posts.read"));
        ov.clear(&perm("posts.write"));

        assert!(ov.is_empty());
    }
}
