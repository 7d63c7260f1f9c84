use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use castellan_core::{RoleId, UserId};

use crate::lockout::SecurityState;
use crate::overrides::PermissionOverrides;

/// User account: the subject of authorization.
///
/// # Invariants
/// - A user always carries exactly one base role (`role_id`).
/// - `overrides.granted` and `overrides.revoked` are disjoint (enforced by
///   `PermissionOverrides`).
/// - Deactivated users are rejected at session validation, before any
///   permission resolution happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    /// Opaque to the engine; produced and checked by the password capability.
    pub password_hash: String,
    pub role_id: RoleId,
    pub overrides: PermissionOverrides,
    pub is_active: bool,
    pub security: SecurityState,
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency version, maintained by the store.
    pub version: u64,
}

impl User {
    pub fn new(
        email: impl Into<String>,
        password_hash: impl Into<String>,
        role_id: RoleId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UserId::new(),
            email: email.into(),
            password_hash: password_hash.into(),
            role_id,
            overrides: PermissionOverrides::new(),
            is_active: true,
            security: SecurityState::default(),
            created_at: now,
            version: 1,
        }
    }
}
