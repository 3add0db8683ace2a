//! Argon2id password hashing.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::AccountServiceError;

/// Hash a password, returning a PHC string that embeds salt and parameters.
///
/// # Errors
///
/// Returns `AccountServiceError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AccountServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AccountServiceError::PasswordHash(e.to_string()))
}

/// Check a password against a stored PHC string.
///
/// # Errors
///
/// Returns `AccountServiceError::PasswordHash` if the stored hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AccountServiceError> {
    let parsed =
        PasswordHash::new(hash).map_err(|e| AccountServiceError::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
