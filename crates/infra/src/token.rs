//! HS256 bearer token service.
//!
//! `jsonwebtoken` handles encoding and signature verification; the claims
//! window is checked separately by the engine's `validate_claims` with an
//! injected clock, so tests can pin time. Library-side expiry validation is
//! therefore disabled on decode.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};

use castellan_auth::{Claims, TokenError, TokenVerifier, validate_claims};
use castellan_core::UserId;

pub struct HsTokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl HsTokenService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by validate_claims against the injected clock.
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Mint a token for a user.
    pub fn issue(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let claims = Claims::new(user_id, now, ttl);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Malformed(e.to_string()))
    }
}

impl TokenVerifier for HsTokenService {
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed(e.to_string()),
            }
        })?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap()
    }

    #[test]
    fn issued_token_verifies_within_window() {
        let service = HsTokenService::new("test-secret");
        let user_id = UserId::new();

        let token = service.issue(user_id, at(0), Duration::minutes(10)).unwrap();
        let claims = service.verify(&token, at(5)).unwrap();

        assert_eq!(claims.sub, user_id);
    }

    #[test]
    fn expired_token_is_rejected_by_injected_clock() {
        let service = HsTokenService::new("test-secret");
        let token = service
            .issue(UserId::new(), at(0), Duration::minutes(10))
            .unwrap();

        assert_eq!(service.verify(&token, at(10)), Err(TokenError::Expired));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let service = HsTokenService::new("test-secret");
        let other = HsTokenService::new("other-secret");
        let token = service
            .issue(UserId::new(), at(0), Duration::minutes(10))
            .unwrap();

        assert!(matches!(
            other.verify(&token, at(5)),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let service = HsTokenService::new("test-secret");
        assert!(matches!(
            service.verify("not-a-token", at(0)),
            Err(TokenError::Malformed(_))
        ));
    }
}
