//! Key derivation using PBKDF2-HMAC-SHA256.
//!
//! The iteration count is part of the on-disk format: blobs carry only their
//! salt, so every reader must derive with the same count.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use crate::keys::{DerivedKey, Salt};

/// PBKDF2 iteration count for every password-encrypted blob.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Derive a 256-bit key from a password and salt.
///
/// Deterministic for a given (password, salt) pair. The password is not
/// stored or logged.
pub fn derive_key(password: &[u8], salt: &Salt) -> DerivedKey {
    let mut key = DerivedKey::zeroed();
    pbkdf2_hmac::<Sha256>(password, salt.as_bytes(), PBKDF2_ITERATIONS, key.as_mut_bytes());
    key
}
