//! Vault settings and remote object layout.

use serde::{Deserialize, Serialize};

use gitvault_common::{Error, Result};
use gitvault_crypto::{decrypt_with_password, encrypt_with_password};
use gitvault_storage::CommitMeta;

/// Encrypted SSH deploy key.
pub const KEY_PATH: &str = ".config/key";
/// Encrypted vault index.
pub const INDEX_PATH: &str = ".config/index";
/// Encrypted vault settings.
pub const SETTINGS_PATH: &str = ".config/settings";
/// Encrypted shared index.
pub const SHARED_INDEX_PATH: &str = "shared/.config/index";

/// Repository path of the share capsule for `reference`.
pub fn shared_object_path(reference: &str) -> String {
    format!("shared/{}", reference)
}

pub const DEFAULT_AUTHOR_NAME: &str = "GitVault";
pub const DEFAULT_AUTHOR_EMAIL: &str = "gitvault@users.noreply.github.com";
pub const DEFAULT_COMMIT_MESSAGE: &str = "Update vault";
pub const DEFAULT_FILE_ID_LENGTH: usize = 16;
pub const DEFAULT_SHARE_ID_LENGTH: usize = 6;

/// Per-vault settings, stored encrypted at `.config/settings`.
///
/// Field names on the wire are kept compatible with vaults written by older
/// clients, which is why the Rust names differ from the JSON keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSettings {
    #[serde(rename = "commit_author_name", default)]
    pub author_name: String,
    #[serde(rename = "commit_author_email", default)]
    pub author_email: String,
    #[serde(default)]
    pub commit_message: String,
    /// Storage id length in hex characters.
    #[serde(rename = "file_hash_length", default)]
    pub file_id_length: usize,
    /// Share reference length in base62 characters.
    #[serde(rename = "share_hash_length", default)]
    pub share_id_length: usize,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            author_name: DEFAULT_AUTHOR_NAME.to_string(),
            author_email: DEFAULT_AUTHOR_EMAIL.to_string(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            file_id_length: DEFAULT_FILE_ID_LENGTH,
            share_id_length: DEFAULT_SHARE_ID_LENGTH,
        }
    }
}

impl VaultSettings {
    /// Fill empty or zero fields with defaults.
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.author_name.is_empty() {
            self.author_name = defaults.author_name;
        }
        if self.author_email.is_empty() {
            self.author_email = defaults.author_email;
        }
        if self.commit_message.is_empty() {
            self.commit_message = defaults.commit_message;
        }
        if self.file_id_length == 0 {
            self.file_id_length = defaults.file_id_length;
        }
        if self.share_id_length == 0 {
            self.share_id_length = defaults.share_id_length;
        }
        self
    }

    /// Check every field is within range.
    ///
    /// # Errors
    /// - `InvalidInput` naming the first offending field
    pub fn validate(&self) -> Result<()> {
        if self.author_name.trim().is_empty() {
            return Err(Error::InvalidInput("Author name cannot be empty".to_string()));
        }
        if self.author_email.trim().is_empty() {
            return Err(Error::InvalidInput("Author email cannot be empty".to_string()));
        }
        if self.commit_message.trim().is_empty() {
            return Err(Error::InvalidInput("Commit message cannot be empty".to_string()));
        }
        if !(8..=64).contains(&self.file_id_length) || self.file_id_length % 2 != 0 {
            return Err(Error::InvalidInput(format!(
                "File hash length must be an even number between 8 and 64, got {}",
                self.file_id_length
            )));
        }
        if !(4..=32).contains(&self.share_id_length) {
            return Err(Error::InvalidInput(format!(
                "Share hash length must be between 4 and 32, got {}",
                self.share_id_length
            )));
        }
        Ok(())
    }

    /// Set one field by its command-line key, then validate.
    ///
    /// On error `self` is left unchanged.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.clone();
        match key {
            "author-name" => updated.author_name = value.to_string(),
            "author-email" => updated.author_email = value.to_string(),
            "commit-message" => updated.commit_message = value.to_string(),
            "file-hash-length" => updated.file_id_length = parse_length(key, value)?,
            "share-hash-length" => updated.share_id_length = parse_length(key, value)?,
            _ => {
                return Err(Error::InvalidInput(format!(
                    "Unknown setting '{}' (expected one of: author-name, author-email, \
                     commit-message, file-hash-length, share-hash-length)",
                    key
                )))
            }
        }
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Number of random bytes behind a storage id.
    pub fn file_id_bytes(&self) -> usize {
        self.file_id_length / 2
    }

    /// Commit author and message for writes made under these settings.
    pub fn commit_meta(&self) -> CommitMeta {
        CommitMeta {
            author_name: self.author_name.clone(),
            author_email: self.author_email.clone(),
            message: self.commit_message.clone(),
        }
    }

    /// Serialize and encrypt under the vault password.
    pub fn encrypt(&self, password: &str) -> Result<Vec<u8>> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| Error::Malformed(format!("Failed to serialize settings: {}", e)))?;
        encrypt_with_password(&json, password)
    }

    /// Decrypt and parse, applying defaults to absent fields.
    pub fn decrypt(blob: &[u8], password: &str) -> Result<Self> {
        let json = decrypt_with_password(blob, password)?;
        let settings: Self = serde_json::from_slice(&json)
            .map_err(|e| Error::Malformed(format!("Failed to parse settings: {}", e)))?;
        Ok(settings.with_defaults())
    }
}

fn parse_length(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("{} must be a number, got '{}'", key, value)))
}
