//! Crockford Base32 identity IDs
//!
//! Format: `U_XXXXXXXXXX` (10 random characters, 50 bits). The alphabet
//! excludes I, L, O and U so IDs are easy to read back.

use rand::Rng;

const CROCKFORD_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

const IDENTITY_PREFIX: &str = "U";
const IDENTITY_ID_LEN: usize = 10;

fn generate_crockford_string(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| CROCKFORD_ALPHABET[rng.gen_range(0..32)] as char)
        .collect()
}

/// Generate a new identity ID (U_XXXXXXXXXX)
pub fn generate_identity_id() -> String {
    format!("{}_{}", IDENTITY_PREFIX, generate_crockford_string(IDENTITY_ID_LEN))
}
