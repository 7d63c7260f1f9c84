//! Role registry endpoints.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde::Deserialize;
use serde_json::json;

use castellan_auth::{NewRole, PermissionId, PermissionPolicy, Policy, Role, builtin};
use castellan_core::RoleId;

use crate::app::AppServices;
use crate::authz::guard;
use crate::context::AuthContext;
use crate::errors;

pub fn router() -> Router {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/:id", get(get_role).delete(delete_role))
        .route("/roles/:id/name", put(rename_role))
        .route("/roles/:id/active", put(set_active))
        .route("/roles/:id/permissions", post(add_permission))
        .route(
            "/roles/:id/permissions/:permission",
            delete(remove_permission),
        )
}

fn read_policy() -> Policy {
    Policy::Permissions(PermissionPolicy::any_of([builtin::ROLES_READ]))
}

fn manage_policy() -> Policy {
    Policy::Permissions(PermissionPolicy::any_of([builtin::ROLES_MANAGE]))
}

fn parse_role_id(raw: &str) -> Result<RoleId, axum::response::Response> {
    raw.parse().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid role id")
    })
}

fn role_payload(role: &Role) -> serde_json::Value {
    json!({
        "id": role.id,
        "name": role.name,
        "permissions": role.permissions,
        "is_system": role.is_system,
        "is_active": role.is_active,
        "bypasses_permission_checks": role.bypasses_permission_checks,
    })
}

/// GET /admin/roles
async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
) -> axum::response::Response {
    if let Err(resp) = guard(&services, &ctx, &read_policy()) {
        return resp;
    }

    match services.registry.list() {
        Ok(roles) => {
            let roles: Vec<_> = roles.iter().map(role_payload).collect();
            (StatusCode::OK, Json(json!({ "roles": roles }))).into_response()
        }
        Err(e) => errors::registry_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct CreateRoleRequest {
    name: String,
    #[serde(default)]
    permissions: Vec<String>,
    #[serde(default)]
    bypasses_permission_checks: bool,
}

/// POST /admin/roles
async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<CreateRoleRequest>,
) -> axum::response::Response {
    if let Err(resp) = guard(&services, &ctx, &manage_policy()) {
        return resp;
    }

    let mut permissions = Vec::with_capacity(req.permissions.len());
    for raw in &req.permissions {
        match PermissionId::parse(raw) {
            Ok(id) => permissions.push(id),
            Err(e) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "validation_error",
                    e.to_string(),
                );
            }
        }
    }

    let mut spec = NewRole::named(req.name).with_permissions(permissions);
    spec.bypasses_permission_checks = req.bypasses_permission_checks;

    match services.registry.create(ctx.principal(), spec) {
        Ok(role) => (StatusCode::CREATED, Json(json!({ "role": role_payload(&role) })))
            .into_response(),
        Err(e) => errors::registry_error_response(e),
    }
}

/// GET /admin/roles/:id
async fn get_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = guard(&services, &ctx, &read_policy()) {
        return resp;
    }
    let role_id = match parse_role_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.registry.get(role_id) {
        Ok(Some(role)) => {
            (StatusCode::OK, Json(json!({ "role": role_payload(&role) }))).into_response()
        }
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "role not found"),
        Err(e) => errors::registry_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct RenameRequest {
    name: String,
}

/// PUT /admin/roles/:id/name
async fn rename_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> axum::response::Response {
    if let Err(resp) = guard(&services, &ctx, &manage_policy()) {
        return resp;
    }
    let role_id = match parse_role_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.registry.rename(ctx.principal(), role_id, &req.name) {
        Ok(role) => (StatusCode::OK, Json(json!({ "role": role_payload(&role) }))).into_response(),
        Err(e) => errors::registry_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct SetActiveRequest {
    active: bool,
}

/// PUT /admin/roles/:id/active - display/filter flag; resolution ignores it.
async fn set_active(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(req): Json<SetActiveRequest>,
) -> axum::response::Response {
    if let Err(resp) = guard(&services, &ctx, &manage_policy()) {
        return resp;
    }
    let role_id = match parse_role_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.registry.set_active(role_id, req.active) {
        Ok(role) => (StatusCode::OK, Json(json!({ "role": role_payload(&role) }))).into_response(),
        Err(e) => errors::registry_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct AddPermissionRequest {
    permission: String,
}

/// POST /admin/roles/:id/permissions
async fn add_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(req): Json<AddPermissionRequest>,
) -> axum::response::Response {
    if let Err(resp) = guard(&services, &ctx, &manage_policy()) {
        return resp;
    }
    let role_id = match parse_role_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let permission = match PermissionId::parse(&req.permission) {
        Ok(permission) => permission,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string());
        }
    };

    match services.registry.add_permission(role_id, permission) {
        Ok(role) => (StatusCode::OK, Json(json!({ "role": role_payload(&role) }))).into_response(),
        Err(e) => errors::registry_error_response(e),
    }
}

/// DELETE /admin/roles/:id/permissions/:permission
async fn remove_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path((id, permission)): Path<(String, String)>,
) -> axum::response::Response {
    if let Err(resp) = guard(&services, &ctx, &manage_policy()) {
        return resp;
    }
    let role_id = match parse_role_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let permission = match PermissionId::parse(&permission) {
        Ok(permission) => permission,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string());
        }
    };

    match services
        .registry
        .remove_permission(ctx.principal(), role_id, &permission)
    {
        Ok(role) => (StatusCode::OK, Json(json!({ "role": role_payload(&role) }))).into_response(),
        Err(e) => errors::registry_error_response(e),
    }
}

/// DELETE /admin/roles/:id
async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = guard(&services, &ctx, &manage_policy()) {
        return resp;
    }
    let role_id = match parse_role_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.registry.delete(ctx.principal(), role_id) {
        Ok(()) => (StatusCode::NO_CONTENT, ()).into_response(),
        Err(e) => errors::registry_error_response(e),
    }
}
