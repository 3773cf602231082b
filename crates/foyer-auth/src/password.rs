//! Password hashing with Argon2id.
//!
//! Hashes are PHC strings (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`),
//! so the algorithm, cost parameters and per-user salt all live next to
//! the hash itself.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::{AuthError, HashingConfig};

fn hasher(config: &HashingConfig) -> Result<Argon2<'static>, AuthError> {
    let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
        .map_err(|e| AuthError::PasswordHashing(format!("invalid parameters: {e}")))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes `password` with a fresh random salt.
///
/// # Errors
/// Returns [`AuthError::PasswordHashing`] if `config` holds parameters
/// Argon2 rejects.
pub fn hash_password(password: &str, config: &HashingConfig) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    hasher(config)?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHashing(e.to_string()))
}

/// Checks `password` against a stored PHC hash.
///
/// A wrong password is `Ok(false)`; only an unparseable hash is an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AuthError::PasswordHashing(format!("malformed hash: {e}")))?;

    // The cost parameters come from the hash, not from this instance.
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::PasswordHashing(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> HashingConfig {
        HashingConfig::minimal()
    }

    #[test]
    fn test_hash_password_produces_argon2id_phc_string() {
        let hash = hash_password("hunter2", &fast()).unwrap();
        assert!(hash.starts_with("$argon2id$"), "got {hash}");
    }

    #[test]
    fn test_verify_password_correct_returns_true() {
        let hash = hash_password("hunter2", &fast()).unwrap();
        assert!(verify_password("hunter2", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_wrong_returns_false() {
        let hash = hash_password("hunter2", &fast()).unwrap();
        assert!(!verify_password("hunter3", &hash).unwrap());
    }

    #[test]
    fn test_hash_password_same_input_different_salt() {
        let a = hash_password("same", &fast()).unwrap();
        let b = hash_password("same", &fast()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_password_malformed_hash_is_error() {
        let result = verify_password("pw", "definitely-not-a-phc-string");
        assert!(matches!(result, Err(AuthError::PasswordHashing(_))));
    }

    #[test]
    fn test_hash_password_rejects_zero_iterations() {
        let config = HashingConfig {
            iterations: 0,
            ..HashingConfig::minimal()
        };
        assert!(hash_password("pw", &config).is_err());
    }
}
