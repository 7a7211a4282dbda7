//! Argon2id password hashing with a random salt per record.

use argon2::password_hash::{
    rand_core::OsRng, Error as HashError, PasswordHash, PasswordHasher as _, PasswordVerifier,
    SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};
use domains::{DomainError, PasswordHasher, Result};

#[derive(Default)]
pub struct Argon2Hasher {
    argon: Argon2<'static>,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Argon2id with explicit cost parameters (memory in KiB, iterations,
    /// lanes). Cheap settings keep test suites fast.
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|err| DomainError::internal(format!("invalid argon2 parameters: {err}")))?;
        Ok(Self {
            argon: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| {
                tracing::error!(error = %err, "password hashing failed");
                DomainError::internal("password hashing failed")
            })
    }

    /// A digest that does not parse is a mismatch, not an error.
    fn verify(&self, plaintext: &str, digest: &str) -> Result<bool> {
        let parsed = match PasswordHash::new(digest) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(error = %err, "stored password digest is malformed");
                return Ok(false);
            }
        };
        match self.argon.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(HashError::Password) => Ok(false),
            Err(err) => {
                tracing::error!(error = %err, "password verification failed");
                Err(DomainError::internal("password verification failed"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hasher = Argon2Hasher::new();
        let digest = hasher.hash("correct horse").unwrap();
        assert!(digest.starts_with("$argon2"));
        assert!(hasher.verify("correct horse", &digest).unwrap());
        assert!(!hasher.verify("battery staple", &digest).unwrap());
    }

    #[test]
    fn salts_differ_per_hash() {
        let hasher = Argon2Hasher::new();
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn custom_params_are_encoded_in_the_digest() {
        let hasher = Argon2Hasher::with_params(8, 1, 1).unwrap();
        let digest = hasher.hash("pw").unwrap();
        assert!(digest.contains("m=8,t=1,p=1"));
        assert!(hasher.verify("pw", &digest).unwrap());
    }

    #[test]
    fn zero_iterations_are_rejected() {
        assert!(Argon2Hasher::with_params(8, 0, 1).is_err());
    }

    #[test]
    fn malformed_digest_never_matches() {
        assert!(!Argon2Hasher::new().verify("pw", "not-a-phc-string").unwrap());
    }
}
