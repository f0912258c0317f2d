//! In-memory backend for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::provider::{Change, ChangeSet, CommitMeta, ObjectFetcher, RemoteBackend, SshCredential};
use gitvault_common::{Error, Result, Username};

/// One recorded commit: its metadata and the full tree it produced.
#[derive(Debug, Clone)]
pub struct CommitRecord {
    pub meta: CommitMeta,
    pub tree: BTreeMap<String, Vec<u8>>,
    /// True for reset writes.
    pub parentless: bool,
}

#[derive(Default)]
struct State {
    repos: HashMap<String, Vec<CommitRecord>>,
    fail_next_write: Option<Error>,
    offline: bool,
}

/// In-memory stand-in for the git remote.
///
/// Keeps every commit of every user's repository so tests can assert how
/// many revisions an operation produced and what each one contained.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    /// Create a backend with no repositories.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next write fail with `error` without touching any repository.
    pub fn fail_next_write(&self, error: Error) {
        self.lock().fail_next_write = Some(error);
    }

    /// While offline every fetch fails with `RemoteUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Current tree of `user`'s repository (empty if never written).
    pub fn snapshot(&self, user: &Username) -> BTreeMap<String, Vec<u8>> {
        self.lock()
            .repos
            .get(user.as_str())
            .and_then(|commits| commits.last())
            .map(|commit| commit.tree.clone())
            .unwrap_or_default()
    }

    /// Number of commits currently reachable from `user`'s branch tip.
    pub fn commit_count(&self, user: &Username) -> usize {
        self.lock()
            .repos
            .get(user.as_str())
            .map(|commits| commits.len())
            .unwrap_or(0)
    }

    /// Most recent commit of `user`'s repository.
    pub fn last_commit(&self, user: &Username) -> Option<CommitRecord> {
        self.lock()
            .repos
            .get(user.as_str())
            .and_then(|commits| commits.last().cloned())
    }

    fn take_injected_failure(state: &mut State) -> Result<()> {
        match state.fail_next_write.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectFetcher for MemoryBackend {
    async fn fetch(&self, user: &Username, path: &str) -> Result<Vec<u8>> {
        let state = self.lock();
        if state.offline {
            return Err(Error::RemoteUnavailable("memory backend is offline".to_string()));
        }

        state
            .repos
            .get(user.as_str())
            .and_then(|commits| commits.last())
            .and_then(|commit| commit.tree.get(path).cloned())
            .ok_or_else(|| Error::NotFound(format!("{}/{}", user, path)))
    }
}

#[async_trait]
impl RemoteBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn incremental_write(
        &self,
        user: &Username,
        _auth: &SshCredential,
        changes: ChangeSet,
        meta: &CommitMeta,
    ) -> Result<()> {
        let mut state = self.lock();
        Self::take_injected_failure(&mut state)?;

        let commits = state
            .repos
            .get_mut(user.as_str())
            .filter(|commits| !commits.is_empty())
            .ok_or_else(|| {
                Error::RemoteUnavailable(format!("repository for {} has no branch", user))
            })?;

        let mut tree = commits
            .last()
            .map(|commit| commit.tree.clone())
            .unwrap_or_default();

        for (path, change) in changes {
            match change {
                Change::Put(bytes) => {
                    tree.insert(path, bytes);
                }
                Change::Delete => {
                    if tree.remove(&path).is_none() {
                        warn!(path = %path, "Object to delete is not in the tree, skipping");
                    }
                }
            }
        }

        commits.push(CommitRecord {
            meta: meta.clone(),
            tree,
            parentless: false,
        });
        debug!(user = %user, commits = commits.len(), "Recorded incremental commit");
        Ok(())
    }

    async fn reset_write(
        &self,
        user: &Username,
        _auth: &SshCredential,
        files: BTreeMap<String, Vec<u8>>,
        meta: &CommitMeta,
    ) -> Result<()> {
        let mut state = self.lock();
        Self::take_injected_failure(&mut state)?;

        state.repos.insert(
            user.as_str().to_string(),
            vec![CommitRecord {
                meta: meta.clone(),
                tree: files,
                parentless: true,
            }],
        );
        debug!(user = %user, "Recorded reset commit");
        Ok(())
    }
}
