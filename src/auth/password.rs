//! Password and one-time code hashing using Argon2
//!
//! Passwords and emailed verification codes share the same argon2id
//! parameters and PHC string format.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::types::MarketError;

/// Hash a secret using Argon2id
///
/// Returns the PHC-formatted hash string that includes the salt and parameters.
pub fn hash_password(password: &str) -> Result<String, MarketError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| MarketError::Internal(format!("Failed to hash secret: {e}")))
}

/// Verify a secret against a stored hash in constant time.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, MarketError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| MarketError::Internal(format!("Invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
