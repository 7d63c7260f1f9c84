//! Permission catalog endpoints.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use serde_json::json;

use castellan_auth::{PermissionId, PermissionPolicy, Policy, RolePolicy, builtin};
use castellan_infra::bootstrap::ADMINISTRATOR_ROLE;

use crate::app::AppServices;
use crate::authz::guard;
use crate::context::AuthContext;
use crate::errors;

pub fn router() -> Router {
    Router::new()
        .route("/permissions", get(list_permissions).post(define_permission))
        .route(
            "/permissions/:id",
            axum::routing::delete(delete_permission),
        )
}

/// GET /admin/permissions - list the catalog
async fn list_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
) -> axum::response::Response {
    let policy = Policy::Permissions(PermissionPolicy::any_of([builtin::PERMISSIONS_READ]));
    if let Err(resp) = guard(&services, &ctx, &policy) {
        return resp;
    }

    match services.catalog.list() {
        Ok(defs) => (StatusCode::OK, Json(json!({ "permissions": defs }))).into_response(),
        Err(e) => errors::catalog_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct DefinePermissionRequest {
    id: String,
    description: Option<String>,
}

/// POST /admin/permissions
async fn define_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<DefinePermissionRequest>,
) -> axum::response::Response {
    let policy = Policy::Permissions(PermissionPolicy::any_of([builtin::PERMISSIONS_MANAGE]));
    if let Err(resp) = guard(&services, &ctx, &policy) {
        return resp;
    }

    match services.catalog.define(&req.id, req.description, false) {
        Ok(def) => (StatusCode::CREATED, Json(json!({ "permission": def }))).into_response(),
        Err(e) => errors::catalog_error_response(e),
    }
}

/// DELETE /admin/permissions/:id - catalog deletion is restricted to the
/// administrator role itself, not just any `permissions.manage` holder.
async fn delete_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let policy = Policy::Roles(RolePolicy::among([ADMINISTRATOR_ROLE]));
    if let Err(resp) = guard(&services, &ctx, &policy) {
        return resp;
    }

    let id = match PermissionId::parse(&id) {
        Ok(id) => id,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string());
        }
    };

    match services.catalog.remove(ctx.principal(), &id) {
        Ok(()) => (StatusCode::NO_CONTENT, ()).into_response(),
        Err(e) => errors::catalog_error_response(e),
    }
}
