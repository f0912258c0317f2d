//! Common utilities and types shared across GitVault crates.
//!
//! This module provides foundational types that are used throughout the codebase,
//! ensuring consistency and type safety.

pub mod error;
pub mod types;

pub use error::{CryptoError, Error, Result};
pub use types::{Password, SensitiveBytes, Username, VaultPath};
