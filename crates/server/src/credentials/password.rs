//! Password hashing and policy.
//!
//! Hashes are Argon2id keyed with the server secret key, over the password and
//! a per-record salt. The salt is stored in its own column and is also part of
//! the PHC string; verification requires both to agree.

use crate::config::HashingConfig;
use crate::error::CredentialError;
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::collections::HashSet;
use std::sync::Arc;

pub const PASSWORD_MIN_CHARACTERS: usize = 12;
pub const PASSWORD_MAX_CHARACTERS: usize = 30;
pub const PASSWORD_MIN_UNIQUE_CHARACTERS: usize = 7;

/// Keyed Argon2id hasher shared by every credential operation.
#[derive(Clone)]
pub struct CredentialHasher {
    secret: Arc<[u8]>,
    params: Params,
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl CredentialHasher {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self::with_params(secret, Params::default())
    }

    pub fn with_params(secret: impl AsRef<[u8]>, params: Params) -> Self {
        Self {
            secret: Arc::from(secret.as_ref()),
            params,
        }
    }

    pub fn from_config(
        secret: impl AsRef<[u8]>,
        config: &HashingConfig,
    ) -> Result<Self, CredentialError> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?;
        Ok(Self::with_params(secret, params))
    }

    fn argon2(&self) -> Result<Argon2<'_>, CredentialError> {
        Argon2::new_with_secret(
            &self.secret,
            Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )
        .map_err(|e| CredentialError::Hashing(e.to_string()))
    }

    /// Fresh random salt, B64 encoded.
    pub fn generate_salt() -> String {
        SaltString::generate(&mut OsRng).as_str().to_owned()
    }

    /// Hash `password` with the given salt. Returns the PHC string.
    pub fn hash(&self, password: &str, salt: &str) -> Result<String, CredentialError> {
        let salt = SaltString::from_b64(salt).map_err(|e| CredentialError::Hashing(e.to_string()))?;
        let hash = self
            .argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Recompute the hash of `password` with the stored salt and compare.
    pub fn verify(&self, password: &str, salt: &str, stored_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored_hash) else {
            return false;
        };
        if parsed.salt.map(|s| s.as_str()) != Some(salt) {
            return false;
        }
        let Ok(argon2) = self.argon2() else {
            return false;
        };
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    }
}

fn count_unique_characters(s: &str) -> usize {
    s.chars().collect::<HashSet<_>>().len()
}

/// Reject passwords outside the length bounds, with too few distinct
/// characters, or overlapping the username or email (case-insensitive).
pub fn validate_password(password: &str, username: &str, email: &str) -> Result<(), CredentialError> {
    let length = password.chars().count();
    if length < PASSWORD_MIN_CHARACTERS {
        return Err(CredentialError::Validation(format!(
            "Your password should have at least {PASSWORD_MIN_CHARACTERS} characters"
        )));
    }
    if length > PASSWORD_MAX_CHARACTERS {
        return Err(CredentialError::Validation(format!(
            "Your password should have at most {PASSWORD_MAX_CHARACTERS} characters"
        )));
    }

    let pass = password.to_lowercase();
    let user = username.to_lowercase();
    let mail = email.to_lowercase();

    if pass.contains(&user) || user.contains(&pass) {
        return Err(CredentialError::Validation(
            "Your password is too similar to your username".into(),
        ));
    }
    if pass.contains(&mail) || mail.contains(&pass) {
        return Err(CredentialError::Validation(
            "Your password is too similar to your email".into(),
        ));
    }
    if count_unique_characters(&pass) < PASSWORD_MIN_UNIQUE_CHARACTERS {
        return Err(CredentialError::Validation(format!(
            "Your password should have at least {PASSWORD_MIN_UNIQUE_CHARACTERS} unique characters"
        )));
    }
    Ok(())
}

/// Policy summary shown next to password fields.
pub fn password_rules() -> String {
    format!(
        "At least {PASSWORD_MIN_CHARACTERS} and at most {PASSWORD_MAX_CHARACTERS} characters, \
         at least {PASSWORD_MIN_UNIQUE_CHARACTERS} unique characters, different from your username and email."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> CredentialHasher {
        let params = Params::new(1024, 1, 1, None).unwrap();
        CredentialHasher::with_params("0123456789abcdef0123456789abcdef", params)
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hasher = hasher();
        let salt = CredentialHasher::generate_salt();
        let hash = hasher.hash("my-secure-password-123!", &salt).unwrap();

        assert!(hash.starts_with("$argon2id"));
        assert!(hasher.verify("my-secure-password-123!", &salt, &hash));
        assert!(!hasher.verify("wrong-password", &salt, &hash));
    }

    #[test]
    fn test_distinct_salts_give_distinct_hashes() {
        let hasher = hasher();
        let (s1, s2) = (CredentialHasher::generate_salt(), CredentialHasher::generate_salt());
        assert_ne!(s1, s2);
        let h1 = hasher.hash("same-password", &s1).unwrap();
        let h2 = hasher.hash("same-password", &s2).unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_hash_is_keyed_by_secret() {
        let params = Params::new(1024, 1, 1, None).unwrap();
        let other = CredentialHasher::with_params("another-secret-another-secret-xx", params);
        let salt = CredentialHasher::generate_salt();
        let hash = hasher().hash("my-secure-password-123!", &salt).unwrap();
        assert!(!other.verify("my-secure-password-123!", &salt, &hash));
    }

    #[test]
    fn test_verify_rejects_salt_mismatch_and_garbage() {
        let hasher = hasher();
        let salt = CredentialHasher::generate_salt();
        let hash = hasher.hash("my-secure-password-123!", &salt).unwrap();
        let other_salt = CredentialHasher::generate_salt();
        assert!(!hasher.verify("my-secure-password-123!", &other_salt, &hash));
        assert!(!hasher.verify("password", &salt, "not-a-valid-hash"));
        assert!(!hasher.verify("password", &salt, ""));
    }

    #[test]
    fn test_invalid_cost_parameters_are_rejected() {
        let config = HashingConfig {
            memory_kib: 1,
            iterations: 1,
            parallelism: 1,
        };
        assert!(matches!(
            CredentialHasher::from_config("0123456789abcdef0123456789abcdef", &config),
            Err(CredentialError::Hashing(_))
        ));
    }

    #[test]
    fn test_policy_accepts_strong_password() {
        assert!(validate_password("kq8#Vz1mPw3!Lr7t", "alice", "alice@x.com").is_ok());
        assert!(validate_password("Str0ngP@ssw0rd!", "alice", "alice@x.com").is_ok());
    }

    #[test]
    fn test_policy_length_bounds() {
        assert!(validate_password("Ab1!cd2@ef", "alice", "alice@x.com").is_err());
        let long = "Ab1!cd2@ef3#gh4$ij5%kl6^mn7&op8*";
        assert!(long.len() > PASSWORD_MAX_CHARACTERS);
        assert!(validate_password(long, "alice", "alice@x.com").is_err());
    }

    #[test]
    fn test_policy_similarity() {
        let err = validate_password("xxALICEyy123!#", "alice", "a@x.com").unwrap_err();
        assert!(err.to_string().contains("username"));
        let err = validate_password("zz-alice@x.com-1", "bob", "alice@x.com").unwrap_err();
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn test_policy_unique_characters() {
        let err = validate_password("abcabcabcabcabc", "bob", "bob@x.com").unwrap_err();
        assert!(err.to_string().contains("unique"));
        // case-insensitive: "aAbB..." has only lowercase-distinct letters
        assert!(validate_password("aAbBcCaAbBcCdD", "bob", "bob@x.com").is_err());
    }
}
