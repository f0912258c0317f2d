//! Common error types for GitVault.

use thiserror::Error;

/// Failures raised by the cryptographic primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Blob is shorter than its fixed header.
    #[error("ciphertext too short: need at least {minimum} bytes, got {actual}")]
    TooShort { minimum: usize, actual: usize },

    /// AEAD tag verification failed (wrong password, wrong key or tampered data).
    #[error("authentication failed")]
    AuthFailed,

    /// Raw key had the wrong size.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}

/// Top-level error type for GitVault operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    /// Wrong vault password. Deliberately carries no further detail.
    #[error("Authentication failed: invalid password")]
    AuthFailed,

    /// Path, reference or remote object does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An intermediate path component (or a listed path) is a file.
    #[error("Not a folder: {0}")]
    NotAFolder(String),

    /// The path resolves to a folder where a file was required.
    #[error("Not a file: {0}")]
    NotAFile(String),

    /// A name query matched more than one entry with the same score.
    #[error("Ambiguous match for '{query}': {}", candidates.join(", "))]
    Ambiguous {
        query: String,
        candidates: Vec<String>,
    },

    /// The push was rejected because the branch moved (non-fast-forward).
    #[error("Remote conflict: {0}")]
    RemoteConflict(String),

    /// Network, transport or server failure.
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// A blob decrypted fine but did not deserialize.
    #[error("Malformed data: {0}")]
    Malformed(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the failure means "object/path does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Collapse an AEAD failure into the password error reported to users.
    ///
    /// Any other error passes through untouched.
    pub fn into_auth_failure(self) -> Self {
        match self {
            Error::Crypto(CryptoError::AuthFailed) => Error::AuthFailed,
            other => other,
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
