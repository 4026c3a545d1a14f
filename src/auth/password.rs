//! Account passwords
//!
//! Stored as Argon2id PHC strings. A login for an unknown email still runs
//! one verification, against a decoy hash.

use std::sync::OnceLock;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

use crate::types::{NorthstarError, Result};

const DECOY_PASSWORD: &str = "northstar-decoy-password";

static DECOY_HASH: OnceLock<Option<String>> = OnceLock::new();

/// Hash a new account password with a fresh salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| NorthstarError::Internal(format!("Password hashing failed: {e}")))
}

/// Check a login password against the account's stored hash.
///
/// `stored` is `None` when no account matched the email; the result is then
/// always `false`.
pub fn verify_password(password: &str, stored: Option<&str>) -> Result<bool> {
    let Some(stored) = stored else {
        if let Some(decoy) = DECOY_HASH.get_or_init(|| hash_password(DECOY_PASSWORD).ok()) {
            let _ = matches(password, decoy);
        }
        return Ok(false);
    };

    matches(password, stored)
}

fn matches(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| NorthstarError::Internal(format!("Stored password hash is corrupt: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
