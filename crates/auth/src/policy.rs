//! Request-time authorization policies.
//!
//! Three composable policy kinds gate guarded operations: permission lists
//! (any-of or all-of), role-name allowlists, and ownership-or-permission.
//! Evaluation is pure: it consumes a principal plus the effective set
//! resolved once for the request, and produces a typed [`Verdict`]. A deny
//! is a value, never an error thrown past the authorization boundary.

use serde::Serialize;
use thiserror::Error;

use castellan_core::UserId;

use crate::permission::PermissionId;
use crate::resolver::{EffectivePermissions, Principal};

/// Permission-list policy.
///
/// `allow_bypass` (default true) lets a principal whose role carries the
/// bypass capability pass unconditionally. The bypass is decided before the
/// effective set is consulted; it is an escape hatch distinct from normal
/// resolution, not a permission in the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionPolicy {
    pub required: Vec<PermissionId>,
    pub require_all: bool,
    pub allow_bypass: bool,
}

impl PermissionPolicy {
    /// Admit when at least one of the listed permissions is held.
    pub fn any_of(required: impl IntoIterator<Item = PermissionId>) -> Self {
        Self {
            required: required.into_iter().collect(),
            require_all: false,
            allow_bypass: true,
        }
    }

    /// Admit only when every listed permission is held.
    pub fn all_of(required: impl IntoIterator<Item = PermissionId>) -> Self {
        Self {
            require_all: true,
            ..Self::any_of(required)
        }
    }

    /// Disable the bypass escape hatch for this check.
    pub fn without_bypass(mut self) -> Self {
        self.allow_bypass = false;
        self
    }
}

/// Role-name allowlist policy. No bypass: a role is either listed or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePolicy {
    pub allowed: Vec<String>,
}

impl RolePolicy {
    pub fn among(allowed: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

/// Ownership-or-permission policy.
///
/// Admits on bypass or on one of the override permissions; otherwise the
/// engine hands back an [`OwnershipProbe`] and the caller settles ownership
/// with the resource's own collaborator logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipPolicy {
    /// Name of the resource field holding the owning identity (for the
    /// caller and audit logs; the engine never dereferences it).
    pub owner_field: String,
    pub override_permissions: Vec<PermissionId>,
}

impl OwnershipPolicy {
    pub fn new(
        owner_field: impl Into<String>,
        override_permissions: impl IntoIterator<Item = PermissionId>,
    ) -> Self {
        Self {
            owner_field: owner_field.into(),
            override_permissions: override_permissions.into_iter().collect(),
        }
    }
}

/// A declared policy, composable by the calling route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Policy {
    Permissions(PermissionPolicy),
    Roles(RolePolicy),
    OwnershipOr(OwnershipPolicy),
}

/// Which rule admitted the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmitVia {
    Bypass,
    Permissions,
    Role,
    Ownership,
}

/// Record of a permission check, attached to the request context for
/// downstream audit logging. Never persisted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionAudit {
    pub checked: Vec<PermissionId>,
    pub held: Vec<PermissionId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmitDetails {
    pub via: AdmitVia,
    pub audit: Option<PermissionAudit>,
}

/// Ownership could not be decided by permissions alone; the caller settles
/// it against the resource's owning identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipProbe {
    pub principal_id: UserId,
    pub resource_id: Option<String>,
    pub owner_field: String,
}

/// Authorization denial: a valid principal with insufficient access.
///
/// Distinct from authentication failures (no/invalid principal) and from
/// consistency errors (data-integrity bugs); always carries the specific
/// reason. `resolved` supports audit and debugging; callers may redact it in
/// production responses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Denial {
    #[error("missing required permission(s): {}", format_ids(.missing))]
    MissingPermissions {
        missing: Vec<PermissionId>,
        resolved: Vec<PermissionId>,
    },

    #[error("role '{role}' is not allowed for this operation")]
    RoleNotAllowed { role: String, allowed: Vec<String> },

    #[error("principal does not own the targeted resource")]
    NotOwner { resource_id: Option<String> },
}

fn format_ids(ids: &[PermissionId]) -> String {
    ids.iter()
        .map(PermissionId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Typed authorization outcome. Denies are values; nothing here panics or
/// silently admits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Admit(AdmitDetails),
    Deny(Denial),
    CheckOwnership(OwnershipProbe),
}

/// Evaluate a policy against a principal and its resolved permission set.
///
/// `effective` is the set resolved once for this request; passing it
/// explicitly keeps resolution a first-class, testable value instead of a
/// hidden recomputation. `resource` identifies the target of an
/// ownership-or-permission policy and is echoed back in the probe.
pub fn authorize(
    principal: &Principal,
    effective: &EffectivePermissions,
    policy: &Policy,
    resource: Option<&str>,
) -> Verdict {
    match policy {
        Policy::Permissions(p) => eval_permissions(principal, effective, p),
        Policy::Roles(p) => eval_roles(principal, p),
        Policy::OwnershipOr(p) => eval_ownership(principal, effective, p, resource),
    }
}

fn eval_permissions(
    principal: &Principal,
    effective: &EffectivePermissions,
    policy: &PermissionPolicy,
) -> Verdict {
    if policy.allow_bypass && principal.bypasses_permission_checks() {
        return Verdict::Admit(AdmitDetails {
            via: AdmitVia::Bypass,
            audit: None,
        });
    }

    let held: Vec<PermissionId> = policy
        .required
        .iter()
        .filter(|id| effective.contains(id))
        .cloned()
        .collect();

    // An empty requirement list demands nothing.
    let admitted = if policy.required.is_empty() {
        true
    } else if policy.require_all {
        held.len() == policy.required.len()
    } else {
        !held.is_empty()
    };

    if admitted {
        Verdict::Admit(AdmitDetails {
            via: AdmitVia::Permissions,
            audit: Some(PermissionAudit {
                checked: policy.required.clone(),
                held,
            }),
        })
    } else {
        let missing: Vec<PermissionId> = policy
            .required
            .iter()
            .filter(|id| !effective.contains(id))
            .cloned()
            .collect();
        Verdict::Deny(Denial::MissingPermissions {
            missing,
            resolved: effective.to_sorted_vec(),
        })
    }
}

fn eval_roles(principal: &Principal, policy: &RolePolicy) -> Verdict {
    if policy
        .allowed
        .iter()
        .any(|name| name == principal.role_name())
    {
        Verdict::Admit(AdmitDetails {
            via: AdmitVia::Role,
            audit: None,
        })
    } else {
        Verdict::Deny(Denial::RoleNotAllowed {
            role: principal.role_name().to_string(),
            allowed: policy.allowed.clone(),
        })
    }
}

fn eval_ownership(
    principal: &Principal,
    effective: &EffectivePermissions,
    policy: &OwnershipPolicy,
    resource: Option<&str>,
) -> Verdict {
    if principal.bypasses_permission_checks() {
        return Verdict::Admit(AdmitDetails {
            via: AdmitVia::Bypass,
            audit: None,
        });
    }

    let held: Vec<PermissionId> = policy
        .override_permissions
        .iter()
        .filter(|id| effective.contains(id))
        .cloned()
        .collect();

    if !held.is_empty() {
        return Verdict::Admit(AdmitDetails {
            via: AdmitVia::Permissions,
            audit: Some(PermissionAudit {
                checked: policy.override_permissions.clone(),
                held,
            }),
        });
    }

    Verdict::CheckOwnership(OwnershipProbe {
        principal_id: principal.user_id,
        resource_id: resource.map(str::to_string),
        owner_field: policy.owner_field.clone(),
    })
}
