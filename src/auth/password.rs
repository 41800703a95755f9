//! Password hashing and verification using Argon2id.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString};
use argon2::{Argon2, Params, PasswordVerifier, Version};

use crate::{Result, StratusError};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

fn hasher() -> Argon2<'static> {
    // Argon2id, 64 MiB, 3 iterations, 4 lanes
    let params = Params::new(65536, 3, 4, None).expect("static argon2 params");
    Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params)
}

/// Hash a plaintext password into a PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| StratusError::Internal(format!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored PHC string.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => hasher()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Check a candidate password against the length policy.
pub fn validate_password(password: &str) -> Result<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(StratusError::Invalid(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// An unguessable hash used when scrubbing deleted accounts.
///
/// No plaintext ever corresponds to the stored value in practice, so the
/// anonymized account cannot be logged into.
pub fn scrambled_password() -> Result<String> {
    hash_password(&uuid::Uuid::new_v4().to_string())
}
