//! Vault engine for GitVault.
//!
//! This module provides:
//! - The encrypted vault index and shared index
//! - Session bootstrap, authentication and password change
//! - Upload, download, delete, purge, share and revoke, each one remote commit
//! - Share strings and anonymous capsule reads
//! - A local session cache
//!
//! # Architecture
//! The vault module sits between the front end and the remote backend,
//! handling all encryption/decryption before anything leaves the process.

pub mod cache;
pub mod config;
pub mod index;
pub mod operations;
pub mod session;
pub mod share;
pub mod shared;

pub use cache::SessionCache;
pub use config::VaultSettings;
pub use index::{Entry, EntryInfo, EntryKind, VaultIndex};
pub use operations::VaultOperations;
pub use session::Session;
pub use share::{download_shared, read_shared, ShareString};
pub use shared::{MatchKind, ShareMatch, SharedFileEntry, SharedIndex};
