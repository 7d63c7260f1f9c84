//! Policy guards for handlers.
//!
//! Guards consume the effective set resolved once by the auth middleware and
//! translate the engine's typed verdict into an HTTP response. Admissions
//! record their permission audit on the request context.

use axum::response::Response;

use castellan_auth::{
    AdmitDetails, AdmitVia, Denial, OwnershipPolicy, Policy, Verdict, authorize,
};
use castellan_core::UserId;

use crate::app::AppServices;
use crate::context::AuthContext;
use crate::errors;

/// Check a permission or role policy before running the guarded operation.
pub fn guard(
    services: &AppServices,
    ctx: &AuthContext,
    policy: &Policy,
) -> Result<AdmitDetails, Response> {
    match authorize(ctx.principal(), ctx.effective(), policy, None) {
        Verdict::Admit(details) => {
            if let Some(audit) = &details.audit {
                ctx.record_audit(audit.clone());
            }
            tracing::debug!(
                user_id = %ctx.principal().user_id,
                via = ?details.via,
                "authorization admitted"
            );
            Ok(details)
        }
        Verdict::Deny(denial) => Err(errors::denial_response(
            &denial,
            services.config.expose_resolved_set,
        )),
        // Ownership policies must come through `guard_owned` with a target.
        Verdict::CheckOwnership(_) => {
            tracing::error!("ownership policy evaluated without a target resource");
            Err(errors::internal_error())
        }
    }
}

/// Check an ownership-or-permission policy against a concrete resource.
///
/// `owner` is the resource's owning identity, supplied by the caller's own
/// lookup; the engine never dereferences resources itself.
pub fn guard_owned(
    services: &AppServices,
    ctx: &AuthContext,
    policy: &OwnershipPolicy,
    resource_id: &str,
    owner: Option<UserId>,
) -> Result<AdmitDetails, Response> {
    let policy = Policy::OwnershipOr(policy.clone());
    match authorize(ctx.principal(), ctx.effective(), &policy, Some(resource_id)) {
        Verdict::Admit(details) => {
            if let Some(audit) = &details.audit {
                ctx.record_audit(audit.clone());
            }
            Ok(details)
        }
        Verdict::Deny(denial) => Err(errors::denial_response(
            &denial,
            services.config.expose_resolved_set,
        )),
        Verdict::CheckOwnership(probe) => {
            if owner == Some(probe.principal_id) {
                Ok(AdmitDetails {
                    via: AdmitVia::Ownership,
                    audit: None,
                })
            } else {
                Err(errors::denial_response(
                    &Denial::NotOwner {
                        resource_id: probe.resource_id,
                    },
                    services.config.expose_resolved_set,
                ))
            }
        }
    }
}
