//! Application wiring: stores, engine services, router.

use std::sync::Arc;

use axum::{Extension, Router, http::StatusCode, response::IntoResponse, routing::get};

use castellan_auth::{
    PasswordVault, PermissionCatalog, PermissionStore, RoleRegistry, RoleStore, SessionValidator,
    UserDirectory, UserStore,
};
use castellan_infra::{
    Argon2Vault, HsTokenService, InMemoryPermissionStore, InMemoryRoleStore, InMemoryUserStore,
    seed,
};

use crate::config::ApiConfig;
use crate::{middleware, routes};

pub type DynUserStore = Arc<dyn UserStore>;
pub type DynRoleStore = Arc<dyn RoleStore>;
pub type DynPermissionStore = Arc<dyn PermissionStore>;
pub type DynPasswordVault = Arc<dyn PasswordVault>;

/// Shared services for handlers and middleware.
pub struct AppServices {
    pub config: ApiConfig,
    pub roles: DynRoleStore,
    pub session: SessionValidator<DynUserStore, DynRoleStore, Arc<HsTokenService>>,
    pub directory: UserDirectory<DynUserStore, DynRoleStore, DynPermissionStore, DynPasswordVault>,
    pub catalog: PermissionCatalog<DynPermissionStore, DynRoleStore, DynUserStore>,
    pub registry: RoleRegistry<DynRoleStore, DynUserStore, DynPermissionStore>,
    pub tokens: Arc<HsTokenService>,
}

/// Build the application router over fresh in-memory stores.
///
/// Seeds the built-in catalog and system roles; the first account to
/// register becomes the administrator.
pub fn build_app(config: ApiConfig) -> Router {
    let users: DynUserStore = Arc::new(InMemoryUserStore::new());
    let roles: DynRoleStore = Arc::new(InMemoryRoleStore::new());
    let permissions: DynPermissionStore = Arc::new(InMemoryPermissionStore::new());

    // In-memory seeding only fails on duplicate inserts, which idempotent
    // seeding never produces.
    let seeded = seed(&permissions, &roles).expect("seeding in-memory stores");

    let tokens = Arc::new(HsTokenService::new(&config.jwt_secret));
    let vault: DynPasswordVault = Arc::new(Argon2Vault::new());

    let services = Arc::new(AppServices {
        session: SessionValidator::new(users.clone(), roles.clone(), tokens.clone()),
        directory: UserDirectory::new(
            users.clone(),
            roles.clone(),
            permissions.clone(),
            vault,
            config.lockout,
            seeded.administrator.id,
            seeded.member.id,
        ),
        catalog: PermissionCatalog::new(permissions.clone(), roles.clone(), users.clone()),
        registry: RoleRegistry::new(roles.clone(), users.clone(), permissions.clone()),
        tokens,
        roles,
        config,
    });

    let admin = Router::new()
        .merge(routes::users::router())
        .merge(routes::roles::router())
        .merge(routes::permissions::router())
        .layer(axum::middleware::from_fn_with_state(
            services.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .route("/health", get(health))
        .nest("/auth", routes::session::router(services.clone()))
        .nest("/admin", admin)
        .layer(Extension(services))
}

async fn health() -> axum::response::Response {
    (StatusCode::OK, "ok").into_response()
}
