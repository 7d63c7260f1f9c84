//! User administration endpoints.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::json;

use castellan_auth::{
    OwnershipPolicy, PermissionId, PermissionPolicy, Policy, Principal, RoleStore, User, builtin,
};
use castellan_core::{RoleId, UserId};

use crate::app::AppServices;
use crate::authz::{guard, guard_owned};
use crate::context::AuthContext;
use crate::errors;

pub fn router() -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user))
        .route("/users/:id/permissions", get(effective_permissions))
        .route("/users/:id/role", put(set_role))
        .route("/users/:id/grants", post(grant))
        .route("/users/:id/revocations", post(revoke))
        .route("/users/:id/activate", post(activate))
        .route("/users/:id/deactivate", post(deactivate))
}

fn read_policy() -> Policy {
    Policy::Permissions(PermissionPolicy::any_of([builtin::USERS_READ]))
}

fn manage_policy() -> Policy {
    Policy::Permissions(PermissionPolicy::any_of([builtin::USERS_MANAGE]))
}

fn parse_user_id(raw: &str) -> Result<UserId, axum::response::Response> {
    raw.parse().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id")
    })
}

fn user_payload(services: &AppServices, user: &User) -> serde_json::Value {
    let role_name = services
        .roles
        .by_id(user.role_id)
        .ok()
        .flatten()
        .map(|r| r.name);
    json!({
        "id": user.id,
        "email": user.email,
        "role_id": user.role_id,
        "role": role_name,
        "is_active": user.is_active,
        "granted": user.overrides.granted(),
        "revoked": user.overrides.revoked(),
        "login_attempts": user.security.login_attempts,
        "locked_until": user.security.lock_until,
        "created_at": user.created_at,
    })
}

/// GET /admin/users
async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
) -> axum::response::Response {
    if let Err(resp) = guard(&services, &ctx, &read_policy()) {
        return resp;
    }

    match services.directory.list() {
        Ok(users) => {
            let users: Vec<_> = users.iter().map(|u| user_payload(&services, u)).collect();
            (StatusCode::OK, Json(json!({ "users": users }))).into_response()
        }
        Err(e) => errors::directory_error_response(e),
    }
}

/// GET /admin/users/:id - readable by anyone holding `users.read`, or by the
/// account itself (ownership).
async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let user_id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    // The owning identity of a user record is the user itself, so the
    // ownership check needs no lookup; authorize before touching the store.
    let policy = OwnershipPolicy::new("user_id", [builtin::USERS_READ]);
    if let Err(resp) = guard_owned(&services, &ctx, &policy, &id, Some(user_id)) {
        return resp;
    }

    let user = match services.directory.get(user_id) {
        Ok(Some(user)) => user,
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "user not found");
        }
        Err(e) => return errors::directory_error_response(e),
    };

    (
        StatusCode::OK,
        Json(json!({ "user": user_payload(&services, &user) })),
    )
        .into_response()
}

/// GET /admin/users/:id/permissions - the resolved view: role membership,
/// overrides, and the effective set.
async fn effective_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let user_id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let policy = OwnershipPolicy::new("user_id", [builtin::USERS_READ]);
    if let Err(resp) = guard_owned(&services, &ctx, &policy, &id, Some(user_id)) {
        return resp;
    }

    let user = match services.directory.get(user_id) {
        Ok(Some(user)) => user,
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "user not found");
        }
        Err(e) => return errors::directory_error_response(e),
    };

    let role = match services.roles.by_id(user.role_id) {
        Ok(role) => role,
        Err(e) => {
            tracing::error!(error = %e, "role load failed");
            return errors::internal_error();
        }
    };

    let principal = match Principal::assemble(&user, role) {
        Ok(principal) => principal,
        Err(e) => {
            tracing::error!(user_id = %user.id, error = %e, "data integrity fault resolving permissions");
            return errors::internal_error();
        }
    };

    let effective = principal.effective_permissions();
    (
        StatusCode::OK,
        Json(json!({
            "user_id": user.id,
            "role": {
                "name": principal.role.name,
                "permissions": principal.role.permissions,
                "bypasses_permission_checks": principal.role.bypasses_permission_checks,
            },
            "granted": user.overrides.granted(),
            "revoked": user.overrides.revoked(),
            "effective": effective.to_sorted_vec(),
        })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct SetRoleRequest {
    role_id: RoleId,
}

/// PUT /admin/users/:id/role
async fn set_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(req): Json<SetRoleRequest>,
) -> axum::response::Response {
    if let Err(resp) = guard(&services, &ctx, &manage_policy()) {
        return resp;
    }
    let user_id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.directory.set_role(user_id, req.role_id) {
        Ok(user) => (
            StatusCode::OK,
            Json(json!({ "user": user_payload(&services, &user) })),
        )
            .into_response(),
        Err(e) => errors::directory_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct OverrideRequest {
    permission: String,
}

/// POST /admin/users/:id/grants
async fn grant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(req): Json<OverrideRequest>,
) -> axum::response::Response {
    apply_override(&services, &ctx, &id, &req.permission, Override::Grant)
}

/// POST /admin/users/:id/revocations
async fn revoke(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(req): Json<OverrideRequest>,
) -> axum::response::Response {
    apply_override(&services, &ctx, &id, &req.permission, Override::Revoke)
}

enum Override {
    Grant,
    Revoke,
}

fn apply_override(
    services: &AppServices,
    ctx: &AuthContext,
    id: &str,
    permission: &str,
    op: Override,
) -> axum::response::Response {
    if let Err(resp) = guard(services, ctx, &manage_policy()) {
        return resp;
    }
    let user_id = match parse_user_id(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let permission = match PermissionId::parse(permission) {
        Ok(permission) => permission,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string());
        }
    };

    let result = match op {
        Override::Grant => services.directory.grant(user_id, permission),
        Override::Revoke => services.directory.revoke(user_id, permission),
    };

    match result {
        Ok(user) => (
            StatusCode::OK,
            Json(json!({ "user": user_payload(services, &user) })),
        )
            .into_response(),
        Err(e) => errors::directory_error_response(e),
    }
}

/// POST /admin/users/:id/activate
async fn activate(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    set_active(&services, &ctx, &id, true)
}

/// POST /admin/users/:id/deactivate
async fn deactivate(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    set_active(&services, &ctx, &id, false)
}

fn set_active(
    services: &AppServices,
    ctx: &AuthContext,
    id: &str,
    active: bool,
) -> axum::response::Response {
    if let Err(resp) = guard(services, ctx, &manage_policy()) {
        return resp;
    }
    let user_id = match parse_user_id(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let result = if active {
        services.directory.activate(user_id)
    } else {
        services.directory.deactivate(user_id)
    };

    match result {
        Ok(user) => (
            StatusCode::OK,
            Json(json!({ "user": user_payload(services, &user) })),
        )
            .into_response(),
        Err(e) => errors::directory_error_response(e),
    }
}
