//! User directory: account administration and the password login path.
//!
//! Registration applies the first-user rule (the very first account receives
//! the designated superuser role, later accounts the default role); override
//! mutation goes through the invariant-enforcing grant/revoke operations;
//! `authenticate` drives the lockout state machine so a lock transition is
//! reported in the same result as the failed login that caused it.

use chrono::{DateTime, Utc};
use thiserror::Error;

use castellan_core::{ExpectedVersion, RoleId, UserId};

use crate::lockout::{
    FailureOutcome, LockoutError, LockoutPolicy, record_failed_login, record_successful_login,
};
use crate::permission::PermissionId;
use crate::store::{PermissionStore, RoleStore, StoreError, UserStore};
use crate::user::User;

/// Password hashing capability.
///
/// The algorithm is deliberately unspecified here; `castellan-infra` plugs in
/// an Argon2 implementation, tests use cheap stand-ins.
pub trait PasswordVault: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, PasswordError>;

    fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError>;
}

impl<V> PasswordVault for std::sync::Arc<V>
where
    V: PasswordVault + ?Sized,
{
    fn hash(&self, password: &str) -> Result<String, PasswordError> {
        (**self).hash(password)
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        (**self).verify(password, hash)
    }
}

#[derive(Debug, Error)]
#[error("password processing failed: {0}")]
pub struct PasswordError(pub String);

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("invalid email address")]
    InvalidEmail,

    #[error("password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("email is already registered")]
    EmailTaken,

    #[error("user not found")]
    UnknownUser(UserId),

    #[error("role not found")]
    UnknownRole(RoleId),

    #[error("permission '{0}' is not in the catalog")]
    UnknownPermission(PermissionId),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Password login failure.
///
/// All variants are authentication failures from the caller's point of view;
/// `LockedOut` distinguishes the attempt that *caused* the lock so the
/// response can say so.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("invalid email or password")]
    BadCredentials,

    #[error("account is deactivated")]
    Deactivated,

    #[error("account is temporarily locked")]
    Locked { until: DateTime<Utc> },

    #[error("too many failed attempts; account locked")]
    LockedOut { until: DateTime<Utc> },

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Lockout(#[from] LockoutError),
}

const MIN_PASSWORD_LEN: usize = 8;

/// Directory operations over the store contracts.
pub struct UserDirectory<U, R, P, V> {
    users: U,
    roles: R,
    permissions: P,
    vault: V,
    lockout: LockoutPolicy,
    /// Role for the very first registered account.
    first_user_role: RoleId,
    /// Role for every later registration.
    default_role: RoleId,
}

impl<U, R, P, V> UserDirectory<U, R, P, V>
where
    U: UserStore,
    R: RoleStore,
    P: PermissionStore,
    V: PasswordVault,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: U,
        roles: R,
        permissions: P,
        vault: V,
        lockout: LockoutPolicy,
        first_user_role: RoleId,
        default_role: RoleId,
    ) -> Self {
        Self {
            users,
            roles,
            permissions,
            vault,
            lockout,
            first_user_role,
            default_role,
        }
    }

    /// Register a new account.
    pub fn register(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<User, DirectoryError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(DirectoryError::InvalidEmail);
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(DirectoryError::WeakPassword(MIN_PASSWORD_LEN));
        }
        if self.users.by_email(&email)?.is_some() {
            return Err(DirectoryError::EmailTaken);
        }

        let role_id = if self.users.count()? == 0 {
            self.first_user_role
        } else {
            self.default_role
        };

        let hash = self.vault.hash(password)?;
        let user = self.users.insert(User::new(email, hash, role_id, now))?;
        tracing::info!(user_id = %user.id, role_id = %user.role_id, "user registered");
        Ok(user)
    }

    /// Authenticate by email and password, driving the lockout machine.
    ///
    /// Gate order: existence → active flag → lock state → password check.
    /// A failed check counts an attempt; the attempt that trips the
    /// threshold returns `LockedOut` so the lock is visible in the same
    /// response. Success resets the counter unconditionally.
    pub fn authenticate(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<User, LoginError> {
        let email = email.trim().to_lowercase();
        let user = match self.users.by_email(&email) {
            Ok(Some(user)) => user,
            // Unknown email: indistinguishable from a wrong password.
            Ok(None) => return Err(LoginError::BadCredentials),
            Err(e) => return Err(LockoutError::from(e).into()),
        };

        if !user.is_active {
            return Err(LoginError::Deactivated);
        }

        if let Some(until) = user.security.lock_until {
            if now < until {
                return Err(LoginError::Locked { until });
            }
        }

        if self.vault.verify(password, &user.password_hash)? {
            record_successful_login(&self.users, user.id, &self.lockout)?;
            return self
                .users
                .by_id(user.id)
                .map_err(LockoutError::from)?
                .ok_or(LoginError::BadCredentials);
        }

        match record_failed_login(&self.users, user.id, &self.lockout, now)? {
            FailureOutcome::LockedOut { state } => Err(LoginError::LockedOut {
                until: state.lock_until.unwrap_or(now),
            }),
            FailureOutcome::RejectedWhileLocked { until } => Err(LoginError::Locked { until }),
            FailureOutcome::Counted { .. } => Err(LoginError::BadCredentials),
        }
    }

    /// Reassign the user's base role.
    pub fn set_role(&self, user_id: UserId, role_id: RoleId) -> Result<User, DirectoryError> {
        if self.roles.by_id(role_id)?.is_none() {
            return Err(DirectoryError::UnknownRole(role_id));
        }

        let mut user = self.load(user_id)?;
        let expected = ExpectedVersion::Exact(user.version);
        user.role_id = role_id;
        Ok(self.users.update(user, expected)?)
    }

    /// Grant a permission on top of the user's role.
    ///
    /// Clears a standing revocation of the same permission atomically.
    pub fn grant(&self, user_id: UserId, id: PermissionId) -> Result<User, DirectoryError> {
        self.ensure_in_catalog(&id)?;

        let mut user = self.load(user_id)?;
        let expected = ExpectedVersion::Exact(user.version);
        user.overrides.grant(id);
        Ok(self.users.update(user, expected)?)
    }

    /// Revoke a permission regardless of where it came from.
    ///
    /// Clears a standing grant of the same permission atomically.
    pub fn revoke(&self, user_id: UserId, id: PermissionId) -> Result<User, DirectoryError> {
        self.ensure_in_catalog(&id)?;

        let mut user = self.load(user_id)?;
        let expected = ExpectedVersion::Exact(user.version);
        user.overrides.revoke(id);
        Ok(self.users.update(user, expected)?)
    }

    pub fn activate(&self, user_id: UserId) -> Result<User, DirectoryError> {
        self.set_active(user_id, true)
    }

    pub fn deactivate(&self, user_id: UserId) -> Result<User, DirectoryError> {
        self.set_active(user_id, false)
    }

    fn set_active(&self, user_id: UserId, active: bool) -> Result<User, DirectoryError> {
        let mut user = self.load(user_id)?;
        let expected = ExpectedVersion::Exact(user.version);
        user.is_active = active;
        let user = self.users.update(user, expected)?;
        tracing::info!(user_id = %user.id, active, "user active flag changed");
        Ok(user)
    }

    pub fn get(&self, user_id: UserId) -> Result<Option<User>, DirectoryError> {
        Ok(self.users.by_id(user_id)?)
    }

    pub fn list(&self) -> Result<Vec<User>, DirectoryError> {
        let mut users = self.users.list()?;
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    fn load(&self, user_id: UserId) -> Result<User, DirectoryError> {
        self.users
            .by_id(user_id)?
            .ok_or(DirectoryError::UnknownUser(user_id))
    }

    fn ensure_in_catalog(&self, id: &PermissionId) -> Result<(), DirectoryError> {
        if self.permissions.get(id)?.is_none() {
            return Err(DirectoryError::UnknownPermission(id.clone()));
        }
        Ok(())
    }
}
