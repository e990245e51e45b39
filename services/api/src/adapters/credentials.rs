//! services/api/src/adapters/credentials.rs
//!
//! Argon2 implementation of the `CredentialVerifier` port.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use flashcards_core::ports::{CredentialVerifier, PortError, PortResult};
use tracing::error;

const UNKNOWN_ACCOUNT_SALT: &[u8] = b"unknown-account-salt";

#[derive(Clone)]
pub struct Argon2Credentials {
    argon2: Argon2<'static>,
    /// Hash checked for logins with an unknown email. Same cost as real hashes.
    dummy_hash: Option<String>,
}

impl Default for Argon2Credentials {
    fn default() -> Self {
        Self::from_argon2(Argon2::default())
    }
}

impl Argon2Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses explicit cost parameters, e.g. cheap ones in tests.
    pub fn with_params(params: Params) -> Self {
        Self::from_argon2(Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            params,
        ))
    }

    fn from_argon2(argon2: Argon2<'static>) -> Self {
        let dummy_hash = SaltString::encode_b64(UNKNOWN_ACCOUNT_SALT)
            .and_then(|salt| {
                argon2
                    .hash_password(b"unknown-account", &salt)
                    .map(|hash| hash.to_string())
            })
            .map_err(|e| error!("Failed to prepare the unknown-account hash: {:?}", e))
            .ok();
        Self { argon2, dummy_hash }
    }
}

impl CredentialVerifier for Argon2Credentials {
    fn hash_password(&self, password: &str) -> PortResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                error!("Failed to hash password: {:?}", e);
                PortError::Unexpected("failed to hash password".to_string())
            })
    }

    fn verify_password(&self, password: &str, password_hash: &str) -> PortResult<bool> {
        let parsed_hash = PasswordHash::new(password_hash).map_err(|e| {
            error!("Failed to parse password hash: {:?}", e);
            PortError::Unexpected("stored password hash is unreadable".to_string())
        })?;
        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    fn verify_unknown(&self, password: &str) -> bool {
        if let Some(hash) = self.dummy_hash.as_deref() {
            let _ = self.verify_password(password, hash);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> Argon2Credentials {
        Argon2Credentials::with_params(Params::new(1024, 1, 1, None).unwrap())
    }

    #[test]
    fn hashes_verify_only_the_original_password() {
        let credentials = cheap();
        let hash = credentials.hash_password("password1").unwrap();
        assert_ne!(hash, "password1");
        assert!(credentials.verify_password("password1", &hash).unwrap());
        assert!(!credentials.verify_password("password2", &hash).unwrap());
    }

    #[test]
    fn unknown_accounts_pay_for_a_real_verification() {
        let credentials = cheap();
        let dummy = credentials.dummy_hash.clone().unwrap();
        let parsed = PasswordHash::new(&dummy).unwrap();
        assert_eq!(parsed.algorithm.as_str(), "argon2id");
        // Same cost parameters as the hashes written at registration.
        let real = credentials.hash_password("password1").unwrap();
        assert_eq!(parsed.params, PasswordHash::new(&real).unwrap().params);
        assert!(!credentials.verify_unknown("unknown-account"));
        assert!(!credentials.verify_unknown("password1"));
    }

    #[test]
    fn garbage_hashes_are_errors() {
        assert!(matches!(
            cheap().verify_password("password1", "not-a-phc-string"),
            Err(PortError::Unexpected(_))
        ));
    }
}
