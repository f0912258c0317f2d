//! The vault index: the encrypted tree mapping vault paths to stored objects.
//!
//! The whole tree is one JSON document, encrypted under the vault password
//! and stored at `.config/index`. It is independent of where objects live in
//! the repository: a file's remote name is its storage id, never its path.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use gitvault_common::{Error, Result, VaultPath};
use gitvault_crypto::{decrypt_with_password, encrypt_with_password, FileKey};

/// A node of the vault tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Entry {
    File {
        /// Remote object name of the file's ciphertext.
        #[serde(rename = "realName")]
        storage_id: String,
        /// File key encrypted under the vault password, hex-encoded.
        #[serde(rename = "fileKey")]
        wrapped_key: String,
    },
    Folder {
        #[serde(rename = "contents", default)]
        children: BTreeMap<String, Entry>,
    },
}

impl Entry {
    fn empty_folder() -> Self {
        Entry::Folder {
            children: BTreeMap::new(),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Entry::File { .. })
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Entry::Folder { .. })
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::File { .. } => EntryKind::File,
            Entry::Folder { .. } => EntryKind::Folder,
        }
    }

    fn storage_id(&self) -> Option<&str> {
        match self {
            Entry::File { storage_id, .. } => Some(storage_id),
            Entry::Folder { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Folder,
}

/// A flattened view of one entry, as returned by listing and search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub path: VaultPath,
    pub kind: EntryKind,
    pub storage_id: Option<String>,
}

/// Root of the vault tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VaultIndex {
    root: BTreeMap<String, Entry>,
}

impl VaultIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Resolve a path to its entry.
    ///
    /// # Errors
    /// - `InvalidInput` for the root path
    /// - `NotFound` if any component is absent
    /// - `NotAFolder` if an intermediate component is a file
    pub fn find(&self, path: &VaultPath) -> Result<&Entry> {
        let (name, parents) = split_leaf(path)?;

        let mut level = &self.root;
        for (depth, component) in parents.iter().enumerate() {
            level = match level.get(component) {
                Some(Entry::Folder { children }) => children,
                Some(Entry::File { .. }) => return Err(not_a_folder(path, depth)),
                None => return Err(Error::NotFound(path.to_string())),
            };
        }

        level
            .get(name)
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    /// Resolve a path that must be a file, returning `(storage_id, wrapped_key)`.
    pub fn find_file(&self, path: &VaultPath) -> Result<(&str, &str)> {
        match self.find(path)? {
            Entry::File {
                storage_id,
                wrapped_key,
            } => Ok((storage_id, wrapped_key)),
            Entry::Folder { .. } => Err(Error::NotAFile(path.to_string())),
        }
    }

    /// Set the file entry at `path`, creating intermediate folders.
    ///
    /// Re-inserting identical values is a no-op. Replacing a folder with a
    /// file is refused because it would orphan every object beneath it.
    ///
    /// # Errors
    /// - `NotAFolder` if an intermediate component is a file
    /// - `NotAFile` if `path` is an existing folder
    pub fn insert_file(
        &mut self,
        path: &VaultPath,
        storage_id: impl Into<String>,
        wrapped_key: impl Into<String>,
    ) -> Result<()> {
        let (name, parents) = split_leaf(path)?;

        let mut level = &mut self.root;
        for (depth, component) in parents.iter().enumerate() {
            level = match level
                .entry(component.clone())
                .or_insert_with(Entry::empty_folder)
            {
                Entry::Folder { children } => children,
                Entry::File { .. } => return Err(not_a_folder(path, depth)),
            };
        }

        if let Some(Entry::Folder { .. }) = level.get(name) {
            return Err(Error::NotAFile(path.to_string()));
        }

        level.insert(
            name.clone(),
            Entry::File {
                storage_id: storage_id.into(),
                wrapped_key: wrapped_key.into(),
            },
        );
        Ok(())
    }

    /// Detach the entry at `path` and return every storage id beneath it.
    ///
    /// For a file this is its own id; for a folder, the ids of all files in
    /// the subtree in post-order, without duplicates.
    pub fn remove(&mut self, path: &VaultPath) -> Result<Vec<String>> {
        let (name, parents) = split_leaf(path)?;

        let mut level = &mut self.root;
        for (depth, component) in parents.iter().enumerate() {
            level = match level.get_mut(component) {
                Some(Entry::Folder { children }) => children,
                Some(Entry::File { .. }) => return Err(not_a_folder(path, depth)),
                None => return Err(Error::NotFound(path.to_string())),
            };
        }

        let removed = level
            .remove(name)
            .ok_or_else(|| Error::NotFound(path.to_string()))?;

        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        collect_storage_ids(&removed, &mut ids, &mut seen);
        Ok(ids)
    }

    /// Immediate children of a folder (or of the root), sorted by name.
    ///
    /// # Errors
    /// - `NotAFolder` if `path` is a file
    pub fn list(&self, path: &VaultPath) -> Result<Vec<EntryInfo>> {
        let children = if path.is_root() {
            &self.root
        } else {
            match self.find(path)? {
                Entry::Folder { children } => children,
                Entry::File { .. } => return Err(Error::NotAFolder(path.to_string())),
            }
        };

        children
            .iter()
            .map(|(name, entry)| {
                Ok(EntryInfo {
                    path: path.join(name)?,
                    kind: entry.kind(),
                    storage_id: entry.storage_id().map(str::to_string),
                })
            })
            .collect()
    }

    /// Every entry whose full path contains `query`, case-insensitively.
    pub fn search(&self, query: &str) -> Vec<EntryInfo> {
        let needle = query.to_lowercase();
        let mut matches = Vec::new();
        search_level(&self.root, &VaultPath::root(), &needle, &mut matches);
        matches
    }

    /// Number of file entries in the whole tree.
    pub fn file_count(&self) -> usize {
        fn count(level: &BTreeMap<String, Entry>) -> usize {
            level
                .values()
                .map(|entry| match entry {
                    Entry::File { .. } => 1,
                    Entry::Folder { children } => count(children),
                })
                .sum()
        }
        count(&self.root)
    }

    /// Re-encrypt every wrapped file key from `old_password` to `new_password`.
    ///
    /// Stops at the first key that fails to unwrap; callers work on a copy.
    pub fn rewrap_keys(&mut self, old_password: &str, new_password: &str) -> Result<()> {
        fn rewrap(level: &mut BTreeMap<String, Entry>, old: &str, new: &str) -> Result<()> {
            for entry in level.values_mut() {
                match entry {
                    Entry::File { wrapped_key, .. } => {
                        let key = FileKey::unwrap_hex(wrapped_key, old)?;
                        *wrapped_key = key.wrap(new)?;
                    }
                    Entry::Folder { children } => rewrap(children, old, new)?,
                }
            }
            Ok(())
        }
        rewrap(&mut self.root, old_password, new_password)
    }

    /// Serialize and encrypt under the vault password.
    pub fn encrypt(&self, password: &str) -> Result<Vec<u8>> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| Error::Malformed(format!("Failed to serialize index: {}", e)))?;
        encrypt_with_password(&json, password)
    }

    /// Decrypt and parse. Authentication happens before any parsing.
    pub fn decrypt(blob: &[u8], password: &str) -> Result<Self> {
        let json = decrypt_with_password(blob, password)?;
        serde_json::from_slice(&json)
            .map_err(|e| Error::Malformed(format!("Failed to parse index: {}", e)))
    }
}

fn split_leaf(path: &VaultPath) -> Result<(&String, &[String])> {
    path.components()
        .split_last()
        .ok_or_else(|| Error::InvalidInput("Vault path cannot be empty".to_string()))
}

fn not_a_folder(path: &VaultPath, depth: usize) -> Error {
    Error::NotAFolder(path.components()[..=depth].join("/"))
}

fn collect_storage_ids(entry: &Entry, ids: &mut Vec<String>, seen: &mut HashSet<String>) {
    match entry {
        Entry::File { storage_id, .. } => {
            if seen.insert(storage_id.clone()) {
                ids.push(storage_id.clone());
            }
        }
        Entry::Folder { children } => {
            for child in children.values() {
                collect_storage_ids(child, ids, seen);
            }
        }
    }
}

fn search_level(
    level: &BTreeMap<String, Entry>,
    prefix: &VaultPath,
    needle: &str,
    matches: &mut Vec<EntryInfo>,
) {
    for (name, entry) in level {
        let mut components = prefix.components().to_vec();
        components.push(name.clone());
        let Ok(path) = VaultPath::from_components(components) else {
            continue;
        };

        if path.to_string_path().to_lowercase().contains(needle) {
            matches.push(EntryInfo {
                path: path.clone(),
                kind: entry.kind(),
                storage_id: entry.storage_id().map(str::to_string),
            });
        }
        if let Entry::Folder { children } = entry {
            search_level(children, &path, needle, matches);
        }
    }
}
