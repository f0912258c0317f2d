//! Authenticated encryption using AES-256-GCM with a raw key.
//!
//! Blob format: `nonce (12) || ciphertext || tag (16)`. No associated data.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};

use crate::keys::KEY_LENGTH;
use gitvault_common::{CryptoError, Error, Result};

/// Nonce size for AES-GCM (12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

fn cipher(key: &[u8]) -> Result<Aes256Gcm> {
    if key.len() != KEY_LENGTH {
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_LENGTH,
            actual: key.len(),
        }
        .into());
    }
    Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)))
}

/// Encrypt plaintext under a raw 256-bit key.
///
/// # Postconditions
/// - Returns nonce || ciphertext || tag
/// - The nonce is freshly random on every call
///
/// # Errors
/// - Returns error if key length is incorrect
pub fn encrypt_with_key(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher(key)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| Error::InvalidInput("plaintext too large for AES-GCM".to_string()))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce);
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// Decrypt a `nonce || ciphertext || tag` blob under a raw 256-bit key.
///
/// # Errors
/// - `TooShort` if the blob cannot hold a nonce and a tag
/// - `AuthFailed` if the tag does not verify (wrong key or tampered data)
pub fn decrypt_with_key(blob: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::TooShort {
            minimum: NONCE_SIZE + TAG_SIZE,
            actual: blob.len(),
        }
        .into());
    }
    open(blob, key)
}

/// Split off the nonce and authenticate-decrypt the rest.
///
/// Callers guarantee `blob.len() >= NONCE_SIZE`; a truncated tag simply
/// fails authentication.
pub(crate) fn open(blob: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher(key)?;
    let (nonce_bytes, encrypted) = blob.split_at(NONCE_SIZE);

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), encrypted)
        .map_err(|_| CryptoError::AuthFailed.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = [42u8; KEY_LENGTH];
        let plaintext = b"Hello, World!";

        let ciphertext = encrypt_with_key(plaintext, &key).unwrap();
        let decrypted = decrypt_with_key(&ciphertext, &key).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_ciphertext_size() {
        let key = [42u8; KEY_LENGTH];
        let plaintext = b"Test message";

        let ciphertext = encrypt_with_key(plaintext, &key).unwrap();

        assert_eq!(ciphertext.len(), NONCE_SIZE + plaintext.len() + TAG_SIZE);
    }

    #[test]
    fn test_different_nonce_each_time() {
        let key = [42u8; KEY_LENGTH];

        let ct1 = encrypt_with_key(b"Same plaintext", &key).unwrap();
        let ct2 = encrypt_with_key(b"Same plaintext", &key).unwrap();

        assert_ne!(&ct1[..NONCE_SIZE], &ct2[..NONCE_SIZE]);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn test_wrong_key_fails() {
        let ciphertext = encrypt_with_key(b"Secret data", &[1u8; KEY_LENGTH]).unwrap();
        let err = decrypt_with_key(&ciphertext, &[2u8; KEY_LENGTH]).unwrap_err();

        assert!(matches!(err, Error::Crypto(CryptoError::AuthFailed)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = [42u8; KEY_LENGTH];
        let mut ciphertext = encrypt_with_key(b"Important data", &key).unwrap();
        ciphertext[NONCE_SIZE + 5] ^= 0xFF;

        let err = decrypt_with_key(&ciphertext, &key).unwrap_err();
        assert!(matches!(err, Error::Crypto(CryptoError::AuthFailed)));
    }

    #[test]
    fn test_too_short() {
        let err = decrypt_with_key(&[0u8; 27], &[0u8; KEY_LENGTH]).unwrap_err();
        assert!(matches!(
            err,
            Error::Crypto(CryptoError::TooShort { minimum: 28, actual: 27 })
        ));
    }

    #[test]
    fn test_invalid_key_length() {
        assert!(encrypt_with_key(b"data", &[0u8; 16]).is_err());
    }

    #[test]
    fn test_empty_plaintext() {
        let key = [42u8; KEY_LENGTH];

        let ciphertext = encrypt_with_key(b"", &key).unwrap();
        let decrypted = decrypt_with_key(&ciphertext, &key).unwrap();

        assert!(decrypted.is_empty());
    }
}
