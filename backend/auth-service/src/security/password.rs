/// Password hashing and verification using Argon2id
use crate::error::{AuthError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a password using Argon2id with a fresh random salt.
///
/// Returns a PHC-formatted hash string safe for database storage. Length
/// policy (minimum 8 characters) is enforced at the request boundary so the
/// caller gets a specific validation message rather than a hashing error.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Internal(format!("Password hashing failed: {}", e)))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against its stored PHC hash.
///
/// Returns `Ok(false)` on mismatch; only malformed hashes or backend
/// failures surface as errors.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| AuthError::Internal(format!("Invalid password hash format: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Internal(format!(
            "Password verification failed: {}",
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_password("pw123456").expect("hashing should succeed");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("pw123456", &hash).unwrap());
    }

    #[test]
    fn wrong_password_does_not_verify() {
        let hash = hash_password("pw123456").expect("hashing should succeed");
        assert!(!verify_password("pw1234567", &hash).unwrap());
    }

    #[test]
    fn same_password_hashes_differently() {
        let a = hash_password("pw123456").unwrap();
        let b = hash_password("pw123456").unwrap();
        assert_ne!(a, b, "salts must differ");
    }

    #[test]
    fn malformed_hash_is_an_error_not_a_mismatch() {
        let result = verify_password("pw123456", "not-a-phc-hash");
        assert!(matches!(result, Err(AuthError::Internal(_))));
    }
}
