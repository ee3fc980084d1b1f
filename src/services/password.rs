// src/services/password.rs
//! Password hashing for local accounts
//!
//! Records are stored as `base64(salt):base64(digest)` where the digest is
//! PBKDF2-HMAC-SHA256 over the password with a fresh 16-byte salt.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const DIGEST_LEN: usize = 32;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 100;

/// Outcome of the signup password policy check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordStrength {
    pub valid: bool,
    pub reason: String,
}

fn derive(password: &str, salt: &[u8]) -> [u8; DIGEST_LEN] {
    let mut out = [0u8; DIGEST_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut out);
    out
}

/// Hash a password with a freshly generated salt
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);

    let digest = derive(password, &salt);
    format!("{}:{}", BASE64.encode(salt), BASE64.encode(digest))
}

/// Check a password against a stored record.
///
/// Malformed records verify as `false`.
pub fn verify_password(password: &str, record: &str) -> bool {
    let Some((salt_b64, digest_b64)) = record.split_once(':') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (BASE64.decode(salt_b64), BASE64.decode(digest_b64)) else {
        return false;
    };
    if salt.is_empty() || expected.len() != DIGEST_LEN {
        return false;
    }

    let actual = derive(password, &salt);
    actual.ct_eq(expected.as_slice()).into()
}

/// Signup policy: 8..=100 characters with at least one letter and one digit
pub fn validate_strength(password: &str) -> PasswordStrength {
    let len = password.chars().count();
    let reject = |reason: &str| PasswordStrength {
        valid: false,
        reason: reason.to_string(),
    };

    if len < MIN_PASSWORD_LEN {
        return reject("password must be at least 8 characters");
    }
    if len > MAX_PASSWORD_LEN {
        return reject("password must be at most 100 characters");
    }
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return reject("password must contain both letters and digits");
    }

    PasswordStrength {
        valid: true,
        reason: "OK".to_string(),
    }
}
