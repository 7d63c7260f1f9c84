//! Account security state machine: login-attempt counting and lock timers.
//!
//! The machine gates session validation and the password login path; a locked
//! or deactivated user never reaches permission resolution. Transitions are
//! pure functions of `(current state, policy, now)`; persistence goes through
//! [`UserStore::update_security`] with a version check so concurrent failures
//! cannot both increment from the same stale counter.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use castellan_core::{ExpectedVersion, UserId};

use crate::store::{StoreError, UserStore};

/// Per-user security fields: attempt counter and lock expiry.
///
/// `lock_until` in the future means the account is locked; in the past it is
/// an expired lock whose next failed attempt starts a fresh counting window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityState {
    pub login_attempts: u32,
    pub lock_until: Option<DateTime<Utc>>,
}

impl SecurityState {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.is_some_and(|until| now < until)
    }
}

/// Lockout thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub lock_minutes: i64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lock_minutes: 15,
        }
    }
}

/// Result of counting one failed authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The attempt arrived while the account was locked: rejected at the
    /// gate, counter untouched.
    RejectedWhileLocked { until: DateTime<Utc> },
    /// The attempt was counted; the account remains unlocked.
    Counted { state: SecurityState },
    /// The attempt was counted and tripped the threshold; the account is now
    /// locked. Callers must surface this in the same response that reports
    /// the authentication failure.
    LockedOut { state: SecurityState },
}

impl FailureOutcome {
    pub fn state(&self) -> Option<SecurityState> {
        match self {
            FailureOutcome::RejectedWhileLocked { .. } => None,
            FailureOutcome::Counted { state } | FailureOutcome::LockedOut { state } => Some(*state),
        }
    }
}

impl LockoutPolicy {
    /// Count a failed authentication attempt.
    ///
    /// - Locked and unexpired: rejected, no increment.
    /// - Lock expired: this failure starts a fresh window as attempt 1.
    /// - Otherwise: increment; reaching `max_attempts` locks the account for
    ///   `lock_minutes` from `now`.
    pub fn on_failure(&self, current: &SecurityState, now: DateTime<Utc>) -> FailureOutcome {
        if let Some(until) = current.lock_until {
            if now < until {
                return FailureOutcome::RejectedWhileLocked { until };
            }
        }

        let attempts = if current.lock_until.is_some() {
            // Expired lock: the window resets and this failure counts first.
            1
        } else {
            current.login_attempts + 1
        };

        if attempts >= self.max_attempts {
            FailureOutcome::LockedOut {
                state: SecurityState {
                    login_attempts: attempts,
                    lock_until: Some(now + Duration::minutes(self.lock_minutes)),
                },
            }
        } else {
            FailureOutcome::Counted {
                state: SecurityState {
                    login_attempts: attempts,
                    lock_until: None,
                },
            }
        }
    }

    /// Successful authentication resets the machine unconditionally.
    pub fn on_success(&self) -> SecurityState {
        SecurityState::default()
    }
}

#[derive(Debug, Error)]
pub enum LockoutError {
    #[error("user not found")]
    UnknownUser,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Bounded retries for version conflicts between load and write.
const WRITE_ATTEMPTS: u32 = 5;

/// Count a failed login against the stored account state.
///
/// The read-then-write is version-checked; on contention the state is
/// reloaded and the transition recomputed, so each concurrent failure is
/// counted exactly once.
pub fn record_failed_login<S>(
    store: &S,
    user_id: UserId,
    policy: &LockoutPolicy,
    now: DateTime<Utc>,
) -> Result<FailureOutcome, LockoutError>
where
    S: UserStore + ?Sized,
{
    let mut last_conflict = None;
    for _ in 0..WRITE_ATTEMPTS {
        let user = store.by_id(user_id)?.ok_or(LockoutError::UnknownUser)?;
        let outcome = policy.on_failure(&user.security, now);

        let Some(state) = outcome.state() else {
            return Ok(outcome);
        };

        match store.update_security(user_id, ExpectedVersion::Exact(user.version), state) {
            Ok(_) => {
                if let FailureOutcome::LockedOut { state } = outcome {
                    tracing::warn!(
                        user_id = %user_id,
                        attempts = state.login_attempts,
                        "account locked after repeated failed logins"
                    );
                }
                return Ok(outcome);
            }
            Err(StoreError::Conflict(msg)) => last_conflict = Some(msg),
            Err(e) => return Err(e.into()),
        }
    }

    Err(LockoutError::Store(StoreError::Conflict(
        last_conflict.unwrap_or_else(|| "retries exhausted".to_string()),
    )))
}

/// Reset the attempt counter after a successful authentication.
pub fn record_successful_login<S>(
    store: &S,
    user_id: UserId,
    policy: &LockoutPolicy,
) -> Result<SecurityState, LockoutError>
where
    S: UserStore + ?Sized,
{
    let mut last_conflict = None;
    for _ in 0..WRITE_ATTEMPTS {
        let user = store.by_id(user_id)?.ok_or(LockoutError::UnknownUser)?;
        let state = policy.on_success();

        match store.update_security(user_id, ExpectedVersion::Exact(user.version), state) {
            Ok(_) => return Ok(state),
            Err(StoreError::Conflict(msg)) => last_conflict = Some(msg),
            Err(e) => return Err(e.into()),
        }
    }

    Err(LockoutError::Store(StoreError::Conflict(
        last_conflict.unwrap_or_else(|| "retries exhausted".to_string()),
    )))
}
