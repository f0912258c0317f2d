//! Cryptographic primitives for GitVault.
//!
//! This module provides:
//! - Key derivation using PBKDF2-HMAC-SHA256
//! - Authenticated encryption using AES-256-GCM
//! - Password blobs: `salt || nonce || ciphertext || tag`
//! - Random storage ids and share references
//!
//! # Security Guarantees
//! - Key material is zeroized on drop
//! - No plaintext, password or key material is ever logged

pub mod aead;
pub mod kdf;
pub mod keys;
pub mod password;
pub mod random;

pub use aead::{decrypt_with_key, encrypt_with_key};
pub use kdf::{derive_key, PBKDF2_ITERATIONS};
pub use keys::{DerivedKey, FileKey, MasterKey, Salt};
pub use password::{decrypt_with_password, encrypt_with_password};
pub use random::{generate_file_key, generate_id, generate_share_reference};
