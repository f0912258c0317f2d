//! Remote storage for GitVault.
//!
//! The vault lives in a git repository. Reads go through an anonymous
//! raw-content endpoint one object at a time; writes go through git and
//! produce exactly one commit each.
//!
//! # Design Principles
//! - Backend isolation: no git or HTTP details leak into vault or crypto code
//! - Two write strategies: incremental (clone, modify, push) for everyday
//!   operations, reset (parentless force-push) for setup and purge only
//! - "Not found" is distinguished from every other remote failure

pub mod config;
pub mod git;
pub mod memory;
pub mod provider;
pub mod raw;

pub use config::RemoteConfig;
pub use git::{GitRemote, GitWriter};
pub use memory::{CommitRecord, MemoryBackend};
pub use provider::{Change, ChangeSet, CommitMeta, ObjectFetcher, RemoteBackend, SshCredential};
pub use raw::RawFetcher;
