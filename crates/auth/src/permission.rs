use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Permission identifier.
///
/// Permissions are named capabilities in `resource.action` form (e.g.
/// "posts.read"). The identifier is the unique key of a catalog entry and the
/// value that role membership and per-user overrides refer to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionId(Cow<'static, str>);

/// Error returned when an identifier does not follow the `resource.action` form.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed permission identifier '{0}': expected lowercase resource.action")]
pub struct MalformedPermission(pub String);

impl PermissionId {
    /// Parse and validate an identifier.
    ///
    /// Identifiers must match `^[a-z]+\.[a-z]+$`: a lowercase resource and a
    /// lowercase action, joined by a single dot.
    pub fn parse(name: impl Into<String>) -> Result<Self, MalformedPermission> {
        let name = name.into();
        if is_well_formed(&name) {
            Ok(Self(Cow::Owned(name)))
        } else {
            Err(MalformedPermission(name))
        }
    }

    /// Construct from a compile-time constant.
    ///
    /// The caller is trusted to supply a well-formed `resource.action` string;
    /// this exists so the built-in catalog can be declared as `const` items.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `resource` half of the identifier.
    pub fn resource(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }

    /// The `action` half of the identifier.
    pub fn action(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl core::fmt::Display for PermissionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_well_formed(s: &str) -> bool {
    let Some((resource, action)) = s.split_once('.') else {
        return false;
    };
    let lower_alpha = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_lowercase());
    lower_alpha(resource) && lower_alpha(action)
}

/// Catalog entry for a permission.
///
/// Entries are immutable once referenced by a role or a user override; the
/// catalog only ever creates and deletes them (see `catalog`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDef {
    pub id: PermissionId,
    pub description: Option<String>,
    /// System permissions back the built-in admin surface and may only be
    /// deleted by a bypass-capable actor, never while referenced.
    pub is_system: bool,
}

impl PermissionDef {
    pub fn new(id: PermissionId) -> Self {
        Self {
            id,
            description: None,
            is_system: false,
        }
    }

    pub fn system(id: PermissionId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: Some(description.into()),
            is_system: true,
        }
    }
}
