//! The shared index: every live share capsule, keyed by reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use gitvault_common::{Error, Password, Result};
use gitvault_crypto::{decrypt_with_password, encrypt_with_password};

/// One published share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedFileEntry {
    /// File name shown to recipients.
    pub name: String,
    pub reference: String,
    /// Share password, independent of the vault password.
    pub password: Password,
    pub shared_at: DateTime<Utc>,
    /// Vault path the capsule was made from.
    pub original_path: String,
}

/// How a name query matched a share's file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchKind {
    Exact,
    Prefix,
    Substring,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            MatchKind::Exact => "exact",
            MatchKind::Prefix => "prefix",
            MatchKind::Substring => "substring",
        })
    }
}

/// A name query hit; lower scores are better.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareMatch<'a> {
    pub score: usize,
    pub kind: MatchKind,
    pub entry: &'a SharedFileEntry,
}

const SUBSTRING_PENALTY: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedIndex {
    #[serde(default)]
    files: BTreeMap<String, SharedFileEntry>,
}

impl SharedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.files.contains_key(reference)
    }

    /// Insert or replace the entry under its reference.
    pub fn add(&mut self, entry: SharedFileEntry) {
        self.files.insert(entry.reference.clone(), entry);
    }

    pub fn remove(&mut self, reference: &str) -> Result<SharedFileEntry> {
        self.files
            .remove(reference)
            .ok_or_else(|| Error::NotFound(format!("shared reference '{}'", reference)))
    }

    pub fn get(&self, reference: &str) -> Result<&SharedFileEntry> {
        self.files
            .get(reference)
            .ok_or_else(|| Error::NotFound(format!("shared reference '{}'", reference)))
    }

    /// All entries, oldest share first.
    pub fn list(&self) -> Vec<&SharedFileEntry> {
        let mut entries: Vec<_> = self.files.values().collect();
        entries.sort_by(|a, b| {
            a.shared_at
                .cmp(&b.shared_at)
                .then_with(|| a.reference.cmp(&b.reference))
        });
        entries
    }

    /// Case-insensitive name matching, best score first.
    ///
    /// Matches against the file name (last path segment). Exact match scores
    /// 0, a prefix scores the length difference, a substring scores 100 plus
    /// the length difference. Ties are ordered by reference.
    pub fn find_by_name(&self, query: &str) -> Vec<ShareMatch<'_>> {
        let query = query.to_lowercase();
        let mut matches: Vec<_> = self
            .files
            .values()
            .filter_map(|entry| {
                let name = basename(&entry.name).to_lowercase();
                let extra = name.len().saturating_sub(query.len());
                let (score, kind) = if name == query {
                    (0, MatchKind::Exact)
                } else if name.starts_with(&query) {
                    (extra, MatchKind::Prefix)
                } else if name.contains(&query) {
                    (SUBSTRING_PENALTY + extra, MatchKind::Substring)
                } else {
                    return None;
                };
                Some(ShareMatch { score, kind, entry })
            })
            .collect();

        matches.sort_by(|a, b| {
            a.score
                .cmp(&b.score)
                .then_with(|| a.entry.reference.cmp(&b.entry.reference))
        });
        matches
    }

    /// Resolve a query to exactly one entry: an exact reference first, then
    /// the best name match.
    ///
    /// # Errors
    /// - `NotFound` if nothing matches
    /// - `Ambiguous` if several entries share the best score
    pub fn resolve(&self, query: &str) -> Result<&SharedFileEntry> {
        if let Some(entry) = self.files.get(query) {
            return Ok(entry);
        }

        let matches = self.find_by_name(query);
        let best = matches
            .first()
            .ok_or_else(|| Error::NotFound(format!("no shared file matches '{}'", query)))?;

        let tied: Vec<String> = matches
            .iter()
            .take_while(|m| m.score == best.score)
            .map(|m| format!("{} ({})", m.entry.reference, m.entry.name))
            .collect();

        if tied.len() > 1 {
            return Err(Error::Ambiguous {
                query: query.to_string(),
                candidates: tied,
            });
        }
        Ok(best.entry)
    }

    pub fn encrypt(&self, password: &str) -> Result<Vec<u8>> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| Error::Malformed(format!("Failed to serialize shared index: {}", e)))?;
        encrypt_with_password(&json, password)
    }

    pub fn decrypt(blob: &[u8], password: &str) -> Result<Self> {
        let json = decrypt_with_password(blob, password)?;
        serde_json::from_slice(&json)
            .map_err(|e| Error::Malformed(format!("Failed to parse shared index: {}", e)))
    }
}

fn basename(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}
