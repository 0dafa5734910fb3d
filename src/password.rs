//! Salted PBKDF2 password hashes stored as PHC strings.
//!
//! Only the first [`MAX_PASSWORD_BYTES`] bytes of a password take part in
//! hashing and verification, so any two passwords sharing that prefix are
//! interchangeable.

use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand_core::OsRng;

use crate::Error;

pub const MAX_PASSWORD_BYTES: usize = 72;

lazy_static::lazy_static! {
    /// Checked against when the account does not exist, so a miss costs
    /// the same as a wrong password.
    static ref DUMMY_HASH: String = hash("attendance-dummy-password").unwrap_or_default();
}

fn truncated(password: &str) -> &[u8] {
    let bytes = password.as_bytes();
    &bytes[..bytes.len().min(MAX_PASSWORD_BYTES)]
}

pub fn hash(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Pbkdf2.hash_password(truncated(password), &salt)?.to_string())
}

pub fn verify(password: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(err) => {
            log::warn!("Stored password hash could not be parsed: {}", err);
            return false;
        }
    };
    Pbkdf2.verify_password(truncated(password), &parsed).is_ok()
}

/// Burns one verification for a login against an unknown account.
pub fn verify_dummy(password: &str) {
    let _ = verify(password, &DUMMY_HASH);
}
