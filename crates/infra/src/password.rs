//! Argon2 password handling behind the engine's vault capability.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier as _,
    password_hash::{SaltString, rand_core::OsRng},
};

use castellan_auth::{PasswordError, PasswordVault};

/// Default-parameter Argon2id vault.
#[derive(Debug, Default)]
pub struct Argon2Vault;

impl Argon2Vault {
    pub fn new() -> Self {
        Self
    }
}

impl PasswordVault for Argon2Vault {
    fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| PasswordError(e.to_string()))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(hash).map_err(|e| PasswordError(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trip() {
        let vault = Argon2Vault::new();
        let hash = vault.hash("correct horse").unwrap();

        assert!(vault.verify("correct horse", &hash).unwrap());
        assert!(!vault.verify("battery staple", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error_not_a_mismatch() {
        let vault = Argon2Vault::new();
        assert!(vault.verify("whatever", "not-a-phc-string").is_err());
    }
}
