//! Registration, login, and session introspection.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use castellan_auth::RoleStore;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::app::AppServices;
use crate::context::AuthContext;
use crate::errors;
use crate::middleware;

pub fn router(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route(
            "/me",
            get(me).layer(axum::middleware::from_fn_with_state(
                services,
                middleware::optional_auth,
            )),
        )
}

#[derive(Debug, Deserialize)]
struct CredentialsRequest {
    email: String,
    password: String,
}

/// POST /auth/register - open registration; the first account becomes the
/// administrator, later accounts get the default role.
async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(req): Json<CredentialsRequest>,
) -> axum::response::Response {
    match services.directory.register(&req.email, &req.password, Utc::now()) {
        Ok(user) => {
            let role_name = services
                .roles
                .by_id(user.role_id)
                .ok()
                .flatten()
                .map(|r| r.name);
            (
                StatusCode::CREATED,
                Json(json!({
                    "user": {
                        "id": user.id,
                        "email": user.email,
                        "role_id": user.role_id,
                        "role": role_name,
                    }
                })),
            )
                .into_response()
        }
        Err(e) => errors::directory_error_response(e),
    }
}

/// POST /auth/login - password authentication; failed attempts count toward
/// the lockout threshold and a triggered lock is reported in this response.
async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(req): Json<CredentialsRequest>,
) -> axum::response::Response {
    let now = Utc::now();
    let user = match services.directory.authenticate(&req.email, &req.password, now) {
        Ok(user) => user,
        Err(e) => return errors::login_error_response(&e),
    };

    let ttl = Duration::minutes(services.config.token_ttl_minutes);
    match services.tokens.issue(user.id, now, ttl) {
        Ok(token) => (
            StatusCode::OK,
            Json(json!({
                "token": token,
                "expires_at": now + ttl,
                "user_id": user.id,
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "token issuance failed");
            errors::internal_error()
        }
    }
}

/// GET /auth/me - public endpoint with enhanced-for-authenticated behavior.
async fn me(ctx: Option<Extension<AuthContext>>) -> axum::response::Response {
    let Some(Extension(ctx)) = ctx else {
        return (StatusCode::OK, Json(json!({ "authenticated": false }))).into_response();
    };

    let principal = ctx.principal();
    (
        StatusCode::OK,
        Json(json!({
            "authenticated": true,
            "user_id": principal.user_id,
            "email": principal.email,
            "role": {
                "id": principal.role.id,
                "name": principal.role.name,
                "bypasses_permission_checks": principal.role.bypasses_permission_checks,
            },
            "effective_permissions": ctx.effective().to_sorted_vec(),
        })),
    )
        .into_response()
}
