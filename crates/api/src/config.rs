//! Environment-derived API configuration.

use castellan_auth::LockoutPolicy;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub lockout: LockoutPolicy,
    /// Include the caller's resolved permission set in 403 payloads.
    /// Useful for audit/debugging; deployments may turn it off to redact.
    pub expose_resolved_set: bool,
}

impl ApiConfig {
    /// Read configuration from the environment.
    pub fn from_env() -> Self {
        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            "dev-secret".to_string()
        });

        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            jwt_secret,
            token_ttl_minutes: env_i64("TOKEN_TTL_MINUTES", 60),
            lockout: LockoutPolicy {
                max_attempts: env_i64("LOCKOUT_MAX_ATTEMPTS", 5).max(1) as u32,
                lock_minutes: env_i64("LOCKOUT_DURATION_MINUTES", 15).max(1),
            },
            expose_resolved_set: std::env::var("EXPOSE_RESOLVED_PERMISSIONS")
                .map(|v| !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
        }
    }

    /// Fixed configuration for tests and embedded use.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            jwt_secret: jwt_secret.into(),
            token_ttl_minutes: 60,
            lockout: LockoutPolicy::default(),
            expose_resolved_set: true,
        }
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
