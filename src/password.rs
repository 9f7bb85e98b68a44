use std::sync::OnceLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::ApiError;

/// Minimum password length accepted at signup and on password change.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Stand-in hash checked when there is no stored one, so sign-in costs one Argon2
/// verification whether or not the account exists.
static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

/// Rejects passwords shorter than `MIN_PASSWORD_LENGTH`.
pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

fn hash_blocking(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

fn verify_blocking(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn dummy_hash() -> Option<&'static str> {
    DUMMY_HASH
        .get_or_init(|| hash_blocking("course-portal-dummy-password").ok())
        .as_deref()
}

/// Hash a password using Argon2id with a fresh random salt.
///
/// Returns the PHC string, which embeds the salt and parameters. The work runs on
/// the blocking pool.
pub async fn hash_password(password: &str) -> Result<String, ApiError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_blocking(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("password hashing task failed: {e}")))?
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

/// Verify a password against a stored PHC string on the blocking pool.
///
/// `None` (unknown account, or an account created without a password) never
/// verifies, but still pays for a verification against `DUMMY_HASH`. A malformed
/// hash never verifies.
pub async fn verify_password(password: &str, stored: Option<&str>) -> bool {
    let password = password.to_string();
    let stored = stored.map(str::to_string);
    let outcome = tokio::task::spawn_blocking(move || match stored {
        Some(hash) => verify_blocking(&password, &hash),
        None => {
            if let Some(dummy) = dummy_hash() {
                verify_blocking(&password, dummy);
            }
            false
        }
    })
    .await;

    match outcome {
        Ok(verified) => verified,
        Err(e) => {
            tracing::error!("password verification task failed: {e}");
            false
        }
    }
}
