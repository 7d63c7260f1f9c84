use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, middleware::Next, response::Response};
use chrono::Utc;

use crate::app::AppServices;
use crate::context::AuthContext;
use crate::errors;

/// Require a valid bearer credential; attach the resolved [`AuthContext`].
pub async fn require_auth(
    State(services): State<Arc<AppServices>>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let Some(token) = extract_bearer(req.headers()) else {
        return Err(errors::missing_credentials());
    };

    match services.session.validate(token, Utc::now()) {
        Ok(principal) => {
            req.extensions_mut().insert(AuthContext::new(principal));
            Ok(next.run(req).await)
        }
        Err(e) => Err(errors::session_error_response(&e)),
    }
}

/// Optional authentication: on any failure the request proceeds anonymously
/// (no [`AuthContext`] attached).
pub async fn optional_auth(
    State(services): State<Arc<AppServices>>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let token = extract_bearer(req.headers());
    if let Some(principal) = services.session.validate_optional(token, Utc::now()) {
        req.extensions_mut().insert(AuthContext::new(principal));
    }
    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
