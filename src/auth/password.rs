use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use rand::RngCore;

use super::AuthError;

/// Hashes `password` with argon2id and a fresh random salt.
///
/// Hashing is deliberately slow; call it from `spawn_blocking` on hot paths.
///
/// # Errors
///
/// Returns [`AuthError::Hashing`] if argon2 rejects the input.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::Hashing(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Checks `password` against a stored PHC hash string.
///
/// # Errors
///
/// Returns [`AuthError::Hashing`] if `hash` is not a valid PHC string. A
/// wrong password is `Ok(false)`.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::Hashing(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("Secret!123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Secret!123", &hash).unwrap());
        assert!(!verify_password("secret!123", &hash).unwrap());
    }

    #[test]
    fn test_same_password_gets_distinct_salts() {
        assert_ne!(
            hash_password("Secret!123").unwrap(),
            hash_password("Secret!123").unwrap()
        );
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(matches!(
            verify_password("x", "plaintext"),
            Err(AuthError::Hashing(_))
        ));
    }
}
