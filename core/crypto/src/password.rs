//! Password-based authenticated encryption.
//!
//! Blob format: `salt (16) || nonce (12) || ciphertext || tag (16)`.
//! A fresh salt and nonce are drawn for every call.

use crate::aead::{self, NONCE_SIZE};
use crate::kdf::derive_key;
use crate::keys::{Salt, SALT_SIZE};
use gitvault_common::{CryptoError, Result};

/// Smallest blob `decrypt_with_password` will attempt to open.
pub const PASSWORD_HEADER_SIZE: usize = SALT_SIZE + NONCE_SIZE;

/// Encrypt plaintext under a password.
pub fn encrypt_with_password(plaintext: &[u8], password: &str) -> Result<Vec<u8>> {
    let salt = Salt::generate();
    let key = derive_key(password.as_bytes(), &salt);
    let sealed = aead::encrypt_with_key(plaintext, key.as_bytes())?;

    let mut result = Vec::with_capacity(SALT_SIZE + sealed.len());
    result.extend_from_slice(salt.as_bytes());
    result.extend_from_slice(&sealed);
    Ok(result)
}

/// Decrypt a blob produced by [`encrypt_with_password`].
///
/// # Errors
/// - `TooShort` when the blob is shorter than salt + nonce
/// - `AuthFailed` when the password is wrong or any byte was altered
pub fn decrypt_with_password(blob: &[u8], password: &str) -> Result<Vec<u8>> {
    if blob.len() < PASSWORD_HEADER_SIZE {
        return Err(CryptoError::TooShort {
            minimum: PASSWORD_HEADER_SIZE,
            actual: blob.len(),
        }
        .into());
    }

    let (salt_bytes, sealed) = blob.split_at(SALT_SIZE);
    let mut salt = [0u8; SALT_SIZE];
    salt.copy_from_slice(salt_bytes);

    let key = derive_key(password.as_bytes(), &Salt::from_bytes(salt));
    aead::open(sealed, key.as_bytes())
}
