//! Session validation: bearer credential → loaded principal.
//!
//! Signature verification lives behind [`TokenVerifier`] (the transport
//! layer plugs in a concrete implementation); the deterministic claims-window
//! check is [`validate_claims`]. The validator runs every gate (token, user
//! existence, active flag, lock state) before the principal is assembled,
//! so a deactivated or locked account never reaches permission resolution.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use castellan_core::UserId;

use crate::resolver::{ConsistencyError, Principal};
use crate::store::{RoleStore, StoreError, UserStore};

/// Bearer credential claims (transport-agnostic).
///
/// The minimal claims expected once a token has been decoded and its
/// signature verified by whatever token layer is in use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user the token was issued to.
    pub sub: UserId,

    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,

    /// Expiration, seconds since the Unix epoch.
    pub exp: i64,
}

impl Claims {
    pub fn new(sub: UserId, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub,
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        }
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("token rejected: {0}")]
    Malformed(String),
}

/// Deterministically validate the claims window.
///
/// Note: this validates the *claims* only. Signature verification and
/// decoding are the [`TokenVerifier`]'s concern.
pub fn validate_claims(claims: &Claims, now: DateTime<Utc>) -> Result<(), TokenError> {
    if claims.exp <= claims.iat {
        return Err(TokenError::InvalidTimeWindow);
    }
    if now.timestamp() < claims.iat {
        return Err(TokenError::NotYetValid);
    }
    if now.timestamp() >= claims.exp {
        return Err(TokenError::Expired);
    }
    Ok(())
}

/// Credential verification capability (signature check + decode).
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError>;
}

impl<V> TokenVerifier for std::sync::Arc<V>
where
    V: TokenVerifier + ?Sized,
{
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        (**self).verify(token, now)
    }
}

/// Session validation failure.
///
/// The first five kinds are authentication failures (401-class) with
/// distinct user-facing messages; `Consistency` and `Store` indicate bugs or
/// infrastructure faults and must surface as internal errors, never as a
/// deny.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("authentication token has expired")]
    ExpiredToken,

    #[error("invalid authentication token")]
    InvalidToken,

    #[error("account not found")]
    PrincipalNotFound,

    #[error("account is deactivated")]
    AccountDeactivated,

    #[error("account is temporarily locked")]
    AccountLocked { until: DateTime<Utc> },

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),

    #[error("session lookup failed: {0}")]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Authentication failures are expected, recoverable-by-the-caller
    /// conditions; everything else is an internal fault.
    pub fn is_authentication_failure(&self) -> bool {
        !matches!(
            self,
            SessionError::Consistency(_) | SessionError::Store(_)
        )
    }
}

/// Resolves a bearer credential to a fully loaded principal.
pub struct SessionValidator<U, R, V> {
    users: U,
    roles: R,
    verifier: V,
}

impl<U, R, V> SessionValidator<U, R, V>
where
    U: UserStore,
    R: RoleStore,
    V: TokenVerifier,
{
    pub fn new(users: U, roles: R, verifier: V) -> Self {
        Self {
            users,
            roles,
            verifier,
        }
    }

    /// Validate a credential and load the principal it refers to.
    ///
    /// Gate order is fixed: token → user lookup → active flag → lock state →
    /// role assembly. Resolution is never attempted for a rejected account.
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, SessionError> {
        let claims = self.verifier.verify(token, now).map_err(|e| match e {
            TokenError::Expired => SessionError::ExpiredToken,
            _ => SessionError::InvalidToken,
        })?;

        let user = self
            .users
            .by_id(claims.sub)?
            .ok_or(SessionError::PrincipalNotFound)?;

        if !user.is_active {
            return Err(SessionError::AccountDeactivated);
        }

        if let Some(until) = user.security.lock_until {
            if now < until {
                return Err(SessionError::AccountLocked { until });
            }
        }

        let role = self.roles.by_id(user.role_id)?;
        let principal = Principal::assemble(&user, role).inspect_err(|e| {
            tracing::error!(user_id = %user.id, error = %e, "data integrity fault during session validation");
        })?;

        Ok(principal)
    }

    /// Optional mode: on any failure, proceed anonymously instead of
    /// rejecting. Used by endpoints with public and enhanced-for-
    /// authenticated behavior.
    pub fn validate_optional(&self, token: Option<&str>, now: DateTime<Utc>) -> Option<Principal> {
        let token = token?;
        match self.validate(token, now) {
            Ok(principal) => Some(principal),
            Err(e) => {
                tracing::debug!(error = %e, "optional session validation failed; continuing anonymously");
                None
            }
        }
    }
}
