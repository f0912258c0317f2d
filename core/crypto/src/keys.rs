//! Key types with secure memory handling.
//!
//! All key types automatically zeroize their memory on drop to prevent
//! sensitive data from persisting in memory.

use rand::{rngs::OsRng, RngCore};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use gitvault_common::{CryptoError, Error, Result, SensitiveBytes};

use crate::password::{decrypt_with_password, encrypt_with_password};

/// Length of encryption keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Length of the PBKDF2 salt in bytes.
pub const SALT_SIZE: usize = 16;

/// The user's SSH deploy key, stored encrypted at `.config/key`.
///
/// This is the root of the key hierarchy: whoever holds it can push to the
/// vault repository.
#[derive(Clone)]
pub struct MasterKey(SensitiveBytes);

impl MasterKey {
    /// Wrap raw private key bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(SensitiveBytes::new(bytes))
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Encrypt the key under the vault password.
    pub fn seal(&self, password: &str) -> Result<Vec<u8>> {
        encrypt_with_password(self.as_bytes(), password)
    }

    /// Decrypt a sealed key with the vault password.
    pub fn open(sealed: &[u8], password: &str) -> Result<Self> {
        decrypt_with_password(sealed, password).map(Self::from_bytes)
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterKey([REDACTED])")
    }
}

/// Key derived from a password by PBKDF2.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LENGTH],
}

impl DerivedKey {
    pub(crate) fn zeroed() -> Self {
        Self {
            key: [0u8; KEY_LENGTH],
        }
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8; KEY_LENGTH] {
        &mut self.key
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedKey([REDACTED])")
    }
}

/// Per-file content key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct FileKey {
    key: [u8; KEY_LENGTH],
}

impl FileKey {
    /// Create a file key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Create a file key from a slice, checking its length.
    pub fn from_slice(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_LENGTH {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_LENGTH,
                actual: key.len(),
            }
            .into());
        }
        let mut bytes = [0u8; KEY_LENGTH];
        bytes.copy_from_slice(key);
        Ok(Self { key: bytes })
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// Generate a random file key.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LENGTH];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Encrypt this key under the vault password, hex-encoded for the index.
    pub fn wrap(&self, password: &str) -> Result<String> {
        let sealed = encrypt_with_password(&self.key, password)?;
        Ok(hex::encode(sealed))
    }

    /// Reverse of [`FileKey::wrap`].
    ///
    /// # Errors
    /// - `Malformed` if the string is not hex
    /// - `Crypto(AuthFailed)` on the wrong password or a tampered key
    pub fn unwrap_hex(wrapped: &str, password: &str) -> Result<Self> {
        let sealed = hex::decode(wrapped)
            .map_err(|e| Error::Malformed(format!("wrapped file key is not hex: {}", e)))?;
        let mut raw = decrypt_with_password(&sealed, password)?;
        let key = Self::from_slice(&raw);
        raw.zeroize();
        key
    }
}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileKey([REDACTED])")
    }
}

/// Salt for key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Salt(pub [u8; SALT_SIZE]);

impl Salt {
    /// Generate a random salt.
    pub fn generate() -> Self {
        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        Self(salt)
    }

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the salt bytes.
    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}
