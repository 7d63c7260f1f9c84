//! Error → HTTP response mapping.
//!
//! Authentication failures are 401 with a distinct code per kind;
//! authorization denials are 403 naming the missing permissions; consistency
//! and store faults are logged and become opaque 500s: never a silent deny,
//! never a silent admit.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use castellan_auth::{
    CatalogError, Denial, DirectoryError, LoginError, RegistryError, SessionError, StoreError,
};

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// No usable bearer credential on the request.
pub fn missing_credentials() -> axum::response::Response {
    json_error(
        StatusCode::UNAUTHORIZED,
        "authentication_required",
        "missing bearer credential",
    )
}

pub fn session_error_response(err: &SessionError) -> axum::response::Response {
    match err {
        SessionError::ExpiredToken => {
            json_error(StatusCode::UNAUTHORIZED, "token_expired", err.to_string())
        }
        SessionError::InvalidToken => {
            json_error(StatusCode::UNAUTHORIZED, "token_invalid", err.to_string())
        }
        SessionError::PrincipalNotFound => {
            json_error(StatusCode::UNAUTHORIZED, "account_not_found", err.to_string())
        }
        SessionError::AccountDeactivated => json_error(
            StatusCode::UNAUTHORIZED,
            "account_deactivated",
            err.to_string(),
        ),
        SessionError::AccountLocked { until } => (
            StatusCode::UNAUTHORIZED,
            axum::Json(json!({
                "error": "account_locked",
                "message": err.to_string(),
                "locked_until": until,
            })),
        )
            .into_response(),
        SessionError::Consistency(e) => {
            tracing::error!(error = %e, "data integrity fault in session validation");
            internal_error()
        }
        SessionError::Store(e) => {
            tracing::error!(error = %e, "store fault in session validation");
            internal_error()
        }
    }
}

pub fn login_error_response(err: &LoginError) -> axum::response::Response {
    match err {
        LoginError::BadCredentials => json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            err.to_string(),
        ),
        LoginError::Deactivated => json_error(
            StatusCode::UNAUTHORIZED,
            "account_deactivated",
            err.to_string(),
        ),
        // Both lock variants carry the expiry; `account_locked` on the very
        // attempt that tripped the threshold keeps the transition visible in
        // the failing response.
        LoginError::Locked { until } | LoginError::LockedOut { until } => (
            StatusCode::UNAUTHORIZED,
            axum::Json(json!({
                "error": "account_locked",
                "message": err.to_string(),
                "locked_until": until,
            })),
        )
            .into_response(),
        LoginError::Password(e) => {
            tracing::error!(error = %e, "password capability fault during login");
            internal_error()
        }
        LoginError::Lockout(e) => {
            tracing::error!(error = %e, "lockout bookkeeping fault during login");
            internal_error()
        }
    }
}

pub fn denial_response(denial: &Denial, expose_resolved: bool) -> axum::response::Response {
    let mut body = json!({
        "error": "forbidden",
        "message": denial.to_string(),
    });

    match denial {
        Denial::MissingPermissions { missing, resolved } => {
            body["missing_permissions"] = json!(missing);
            if expose_resolved {
                body["resolved_permissions"] = json!(resolved);
            }
        }
        Denial::RoleNotAllowed { allowed, .. } => {
            body["allowed_roles"] = json!(allowed);
        }
        Denial::NotOwner { .. } => {}
    }

    (StatusCode::FORBIDDEN, axum::Json(body)).into_response()
}

pub fn directory_error_response(err: DirectoryError) -> axum::response::Response {
    match &err {
        DirectoryError::InvalidEmail | DirectoryError::WeakPassword(_) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", err.to_string())
        }
        DirectoryError::EmailTaken => {
            json_error(StatusCode::CONFLICT, "email_taken", err.to_string())
        }
        DirectoryError::UnknownUser(_) => {
            json_error(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        DirectoryError::UnknownRole(_) => {
            json_error(StatusCode::NOT_FOUND, "unknown_role", err.to_string())
        }
        DirectoryError::UnknownPermission(_) => {
            json_error(StatusCode::BAD_REQUEST, "unknown_permission", err.to_string())
        }
        DirectoryError::Password(e) => {
            tracing::error!(error = %e, "password capability fault");
            internal_error()
        }
        DirectoryError::Store(e) => store_error_response(e),
    }
}

pub fn registry_error_response(err: RegistryError) -> axum::response::Response {
    match &err {
        RegistryError::InvalidName(_) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", err.to_string())
        }
        RegistryError::DuplicateName(_) => {
            json_error(StatusCode::CONFLICT, "duplicate_role", err.to_string())
        }
        RegistryError::UnknownRole(_) => {
            json_error(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        RegistryError::UnknownPermission(_) => {
            json_error(StatusCode::BAD_REQUEST, "unknown_permission", err.to_string())
        }
        RegistryError::SystemRole(_) => {
            json_error(StatusCode::FORBIDDEN, "system_role", err.to_string())
        }
        RegistryError::PrivilegedRole => {
            json_error(StatusCode::FORBIDDEN, "privileged_role", err.to_string())
        }
        RegistryError::StillAssigned(_) => {
            json_error(StatusCode::CONFLICT, "role_in_use", err.to_string())
        }
        RegistryError::Store(e) => store_error_response(e),
    }
}

pub fn catalog_error_response(err: CatalogError) -> axum::response::Response {
    match &err {
        CatalogError::Malformed(_) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", err.to_string())
        }
        CatalogError::Duplicate(_) => {
            json_error(StatusCode::CONFLICT, "duplicate_permission", err.to_string())
        }
        CatalogError::Unknown(_) => {
            json_error(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        CatalogError::InUse(_) => {
            json_error(StatusCode::CONFLICT, "permission_in_use", err.to_string())
        }
        CatalogError::SystemPermission(_) => {
            json_error(StatusCode::FORBIDDEN, "system_permission", err.to_string())
        }
        CatalogError::Store(e) => store_error_response(e),
    }
}

fn store_error_response(err: &StoreError) -> axum::response::Response {
    match err {
        StoreError::Conflict(msg) => {
            json_error(StatusCode::CONFLICT, "conflict", msg.clone())
        }
        StoreError::Duplicate(msg) => {
            json_error(StatusCode::CONFLICT, "duplicate", msg.clone())
        }
        StoreError::Backend(msg) => {
            tracing::error!(error = %msg, "store backend fault");
            internal_error()
        }
    }
}

pub fn internal_error() -> axum::response::Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "internal error",
    )
}
