use std::sync::{Arc, Mutex};

use castellan_auth::{EffectivePermissions, PermissionAudit, Principal};

/// Authenticated request context.
///
/// The effective permission set is resolved exactly once, when the context is
/// built by the auth middleware, and passed through the request as a
/// first-class value; guards never recompute it.
#[derive(Clone)]
pub struct AuthContext {
    principal: Arc<Principal>,
    effective: Arc<EffectivePermissions>,
    audits: Arc<Mutex<Vec<PermissionAudit>>>,
}

impl AuthContext {
    pub fn new(principal: Principal) -> Self {
        let effective = principal.effective_permissions();
        Self {
            principal: Arc::new(principal),
            effective: Arc::new(effective),
            audits: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn effective(&self) -> &EffectivePermissions {
        &self.effective
    }

    /// Attach a permission-check record for downstream audit logging.
    pub fn record_audit(&self, audit: PermissionAudit) {
        self.audits.lock().unwrap().push(audit);
    }

    /// Permission checks recorded so far in this request.
    pub fn audits(&self) -> Vec<PermissionAudit> {
        self.audits.lock().unwrap().clone()
    }
}
