//! Local session cache, so one `connect` serves many invocations.
//!
//! The file holds the unlocked session in cleartext and is created with
//! owner-only permissions. It is rewritten only after an operation succeeded,
//! so it never runs ahead of the remote.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use zeroize::Zeroize;

use crate::config::VaultSettings;
use crate::index::VaultIndex;
use crate::session::Session;
use crate::shared::SharedIndex;
use gitvault_common::{Error, Password, Result, Username};
use gitvault_crypto::MasterKey;
use gitvault_storage::RemoteBackend;

#[derive(Serialize, Deserialize)]
struct CachedSession {
    username: Username,
    password: Password,
    /// Base64 of the SSH private key.
    master_key: String,
    index: VaultIndex,
    shared_index: SharedIndex,
    settings: VaultSettings,
}

impl Drop for CachedSession {
    fn drop(&mut self) {
        self.master_key.zeroize();
    }
}

/// Location of the cached session file.
#[derive(Debug, Clone)]
pub struct SessionCache {
    path: PathBuf,
}

impl SessionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<cache dir>/gitvault/session.json` for the current user.
    pub fn default_location() -> Result<Self> {
        let base = dirs::cache_dir().ok_or_else(|| {
            Error::InvalidInput("Could not determine the user cache directory".to_string())
        })?;
        Ok(Self::new(base.join("gitvault").join("session.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `session`, replacing any previous cache.
    pub fn save(&self, session: &Session) -> Result<()> {
        let cached = CachedSession {
            username: session.username().clone(),
            password: session.password().clone(),
            master_key: STANDARD.encode(session.master_key().as_bytes()),
            index: session.index().clone(),
            shared_index: session.shared().clone(),
            settings: session.settings().clone(),
        };
        let mut json = serde_json::to_vec(&cached)
            .map_err(|e| Error::Malformed(format!("Failed to serialize session: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let written = write_private(&self.path, &json);
        json.zeroize();
        written?;

        debug!(path = %self.path.display(), "Session cached");
        Ok(())
    }

    /// Load the cached session, if any, attached to `backend`.
    ///
    /// # Errors
    /// - `Malformed` if the file exists but cannot be parsed
    pub fn load(&self, backend: Arc<dyn RemoteBackend>) -> Result<Option<Session>> {
        let mut json = match std::fs::read(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let parsed: std::result::Result<CachedSession, _> = serde_json::from_slice(&json);
        json.zeroize();

        let cached = parsed.map_err(|e| {
            Error::Malformed(format!(
                "Session cache {} is corrupt ({}); disconnect and connect again",
                self.path.display(),
                e
            ))
        })?;
        let key = STANDARD
            .decode(&cached.master_key)
            .map_err(|e| Error::Malformed(format!("Cached key is not base64: {}", e)))?;

        Ok(Some(Session::from_parts(
            backend,
            cached.username.clone(),
            cached.password.clone(),
            MasterKey::from_bytes(key),
            cached.index.clone(),
            cached.shared_index.clone(),
            cached.settings.clone(),
        )))
    }

    /// Remove the cache. Returns whether a file was there.
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(data)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    std::fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::VaultOperations;
    use gitvault_storage::MemoryBackend;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_load_clear() {
        let dir = TempDir::new().unwrap();
        let cache = SessionCache::new(dir.path().join("nested").join("session.json"));
        let backend = Arc::new(MemoryBackend::new());

        assert!(cache.load(backend.clone()).unwrap().is_none());

        let mut session = Session::bootstrap(
            backend.clone(),
            Username::new("alice").unwrap(),
            b"ssh-key".to_vec(),
            Password::new("W").unwrap(),
        )
        .await
        .unwrap();
        let local = dir.path().join("f.txt");
        std::fs::write(&local, b"cached").unwrap();
        VaultOperations::new(&mut session)
            .upload(&local, &gitvault_common::VaultPath::parse("f.txt").unwrap())
            .await
            .unwrap();

        cache.save(&session).unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(cache.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let mut restored = cache.load(backend).unwrap().unwrap();
        assert_eq!(restored.username().as_str(), "alice");
        assert_eq!(restored.master_key().as_bytes(), b"ssh-key");
        assert_eq!(restored.index(), session.index());

        let content = VaultOperations::new(&mut restored)
            .read(&gitvault_common::VaultPath::parse("f.txt").unwrap())
            .await
            .unwrap();
        assert_eq!(content, b"cached");

        assert!(cache.clear().unwrap());
        assert!(!cache.clear().unwrap());
    }

    #[test]
    fn test_corrupt_cache_is_malformed() {
        let dir = TempDir::new().unwrap();
        let cache = SessionCache::new(dir.path().join("session.json"));
        std::fs::write(cache.path(), b"{not json").unwrap();

        let err = cache.load(Arc::new(MemoryBackend::new())).unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
    }
}
