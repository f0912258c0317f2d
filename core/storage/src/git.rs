//! Write path over git (libgit2) and the combined git remote.
//!
//! Every write runs in a throwaway bare repository: incremental writes clone
//! the branch, rewrite only the staged paths and push a child commit; reset
//! writes build a parentless commit from scratch and force-push it. libgit2
//! is blocking, so each write runs on the blocking pool.
//!
//! The git timeout is a deadline checked only while nothing has been sent:
//! during the clone, before the push and at push negotiation. Once the pack
//! is on the wire the write is awaited to its real outcome, so a reported
//! failure always means the remote did not move.

use async_trait::async_trait;
use git2::build::{RepoBuilder, TreeUpdateBuilder};
use git2::{
    Commit, Cred, ErrorCode, FetchOptions, FileMode, Oid, PushOptions, RemoteCallbacks,
    Repository, Signature, Tree,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::config::RemoteConfig;
use crate::provider::{Change, ChangeSet, CommitMeta, ObjectFetcher, RemoteBackend, SshCredential};
use crate::raw::RawFetcher;
use gitvault_common::{Error, Result, Username};

/// Point after which a write gives up, as long as it has not started pushing.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    fn start(limit: Duration) -> Self {
        Self {
            at: Instant::now() + limit,
            limit,
        }
    }

    fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    fn error(&self, stage: &str) -> Error {
        Error::RemoteUnavailable(format!(
            "git timed out after {}s during {}; nothing was pushed",
            self.limit.as_secs(),
            stage
        ))
    }
}

/// Pushes commits to the vault repository over the configured git URL.
#[derive(Debug, Clone)]
pub struct GitWriter {
    config: RemoteConfig,
}

impl GitWriter {
    pub fn new(config: RemoteConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Clone, apply `changes`, commit on top of the tip, push.
    pub async fn incremental_write(
        &self,
        user: &Username,
        auth: &SshCredential,
        changes: ChangeSet,
        meta: &CommitMeta,
    ) -> Result<()> {
        let config = self.config.clone();
        let url = config.ssh_url(user);
        let auth = auth.clone();
        let meta = meta.clone();
        let deadline = Deadline::start(config.git_timeout());

        self.run_blocking("incremental write", move || {
            let key = auth.private_key_pem()?;
            let prepared = prepare_incremental(&config, &url, key, changes, &meta, deadline)?;
            push(
                &prepared.repo,
                &url,
                key,
                &format!("{0}:{0}", config.branch_ref()),
                deadline,
            )?;
            info!(commit = %prepared.commit, "Pushed incremental commit");
            Ok(())
        })
        .await
    }

    /// Build a parentless commit holding `files` and force-push it.
    pub async fn reset_write(
        &self,
        user: &Username,
        auth: &SshCredential,
        files: BTreeMap<String, Vec<u8>>,
        meta: &CommitMeta,
    ) -> Result<()> {
        let config = self.config.clone();
        let url = config.ssh_url(user);
        let auth = auth.clone();
        let meta = meta.clone();
        let deadline = Deadline::start(config.git_timeout());

        self.run_blocking("reset write", move || {
            reset_blocking(&config, &url, &auth, files, &meta, deadline)
        })
        .await
    }

    /// Run `job` on the blocking pool and wait for it to finish, however long
    /// the push takes.
    async fn run_blocking<F>(&self, what: &'static str, job: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let limit = self.config.git_timeout();
        let mut handle = tokio::task::spawn_blocking(job);

        let joined = match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(what, "git write is past its deadline, waiting for the push outcome");
                handle.await
            }
        };

        joined.map_err(|join_error| {
            Error::RemoteUnavailable(format!("git {} worker failed: {}", what, join_error))
        })?
    }
}

/// A clone with the new commit on its branch, ready to push.
struct PreparedCommit {
    repo: Repository,
    commit: Oid,
    // Holds the clone directory alive; declared last so it drops after `repo`.
    _workdir: TempDir,
}

fn prepare_incremental(
    config: &RemoteConfig,
    url: &str,
    key: &str,
    changes: ChangeSet,
    meta: &CommitMeta,
    deadline: Deadline,
) -> Result<PreparedCommit> {
    let workdir = tempfile::tempdir()?;

    let mut callbacks = callbacks(key);
    callbacks.transfer_progress(move |_| !deadline.expired());
    let mut fetch = FetchOptions::new();
    fetch.remote_callbacks(callbacks);
    if let Some(depth) = config.clone_depth {
        fetch.depth(i32::try_from(depth).unwrap_or(i32::MAX));
    }

    debug!(branch = %config.branch, depth = ?config.clone_depth, "Cloning vault repository");
    let repo = RepoBuilder::new()
        .bare(true)
        .branch(&config.branch)
        .fetch_options(fetch)
        .clone(url, workdir.path())
        .map_err(|e| {
            if deadline.expired() {
                deadline.error("clone")
            } else {
                remote_error("clone", e)
            }
        })?;

    let commit = {
        let parent = repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .map_err(|e| remote_error("resolve branch tip", e))?;
        let base = parent.tree().map_err(local_error)?;

        let tree = apply_changes(&repo, &base, changes)?;
        let commit = commit_tree(&repo, config, meta, &tree, &[&parent])?;
        commit
    };

    Ok(PreparedCommit {
        repo,
        commit,
        _workdir: workdir,
    })
}

fn reset_blocking(
    config: &RemoteConfig,
    url: &str,
    auth: &SshCredential,
    files: BTreeMap<String, Vec<u8>>,
    meta: &CommitMeta,
    deadline: Deadline,
) -> Result<()> {
    let key = auth.private_key_pem()?;
    let workdir = tempfile::tempdir()?;
    let repo = Repository::init_bare(workdir.path()).map_err(local_error)?;

    let empty_oid = repo
        .treebuilder(None)
        .and_then(|builder| builder.write())
        .map_err(local_error)?;
    let empty = repo.find_tree(empty_oid).map_err(local_error)?;

    let mut changes = ChangeSet::new();
    for (path, bytes) in files {
        changes.put(path, bytes);
    }
    let tree = apply_changes(&repo, &empty, changes)?;
    let commit = commit_tree(&repo, config, meta, &tree, &[])?;

    push(&repo, url, key, &format!("+{0}:{0}", config.branch_ref()), deadline)?;
    info!(commit = %commit, "Force-pushed reset commit");
    Ok(())
}

/// Write blobs and produce the updated tree. Deleting an absent path is
/// skipped with a warning.
fn apply_changes<'r>(
    repo: &'r Repository,
    base: &Tree<'_>,
    changes: ChangeSet,
) -> Result<Tree<'r>> {
    let mut update = TreeUpdateBuilder::new();

    for (path, change) in changes {
        match change {
            Change::Put(bytes) => {
                let oid = repo.blob(&bytes).map_err(local_error)?;
                update.upsert(path.as_str(), oid, FileMode::Blob);
            }
            Change::Delete => {
                if base.get_path(Path::new(&path)).is_ok() {
                    update.remove(path.as_str());
                } else {
                    warn!(path = %path, "Object to delete is not in the tree, skipping");
                }
            }
        }
    }

    let oid = update.create_updated(repo, base).map_err(local_error)?;
    repo.find_tree(oid).map_err(local_error)
}

fn commit_tree(
    repo: &Repository,
    config: &RemoteConfig,
    meta: &CommitMeta,
    tree: &Tree<'_>,
    parents: &[&Commit<'_>],
) -> Result<git2::Oid> {
    let signature = Signature::now(&meta.author_name, &meta.author_email).map_err(|e| {
        Error::InvalidInput(format!("Invalid commit author: {}", e.message()))
    })?;

    repo.commit(
        Some(&config.branch_ref()),
        &signature,
        &signature,
        &meta.message,
        tree,
        parents,
    )
    .map_err(local_error)
}

/// Push `refspec`. The deadline can still cancel at negotiation, before any
/// object is sent; after that the outcome is reported as it is.
fn push(
    repo: &Repository,
    url: &str,
    key: &str,
    refspec: &str,
    deadline: Deadline,
) -> Result<()> {
    if deadline.expired() {
        return Err(deadline.error("commit"));
    }

    let mut remote = repo
        .remote_anonymous(url)
        .map_err(|e| remote_error("open remote", e))?;

    let mut rejection: Option<String> = None;
    let mut cancelled = false;
    let pushed = {
        let mut callbacks = callbacks(key);
        callbacks.push_negotiation(|_updates| {
            if deadline.expired() {
                cancelled = true;
                return Err(git2::Error::from_str("deadline passed before push"));
            }
            Ok(())
        });
        callbacks.push_update_reference(|refname, status| {
            if let Some(status) = status {
                rejection = Some(format!("{}: {}", refname, status));
            }
            Ok(())
        });

        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);
        remote.push(&[refspec], Some(&mut options))
    };

    if let Err(e) = pushed {
        if cancelled {
            return Err(deadline.error("push negotiation"));
        }
        return Err(remote_error("push", e));
    }

    match rejection {
        Some(reason) => Err(Error::RemoteConflict(format!("push rejected: {}", reason))),
        None => Ok(()),
    }
}

fn callbacks(key: &str) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, username, _allowed| {
        Cred::ssh_key_from_memory(username.unwrap_or("git"), None, key, None)
    });
    callbacks
}

fn remote_error(stage: &str, e: git2::Error) -> Error {
    match e.code() {
        ErrorCode::NotFastForward => {
            Error::RemoteConflict(format!("{} rejected: {}", stage, e.message()))
        }
        _ => Error::RemoteUnavailable(format!("git {} failed: {}", stage, e.message())),
    }
}

fn local_error(e: git2::Error) -> Error {
    Error::Io(std::io::Error::other(format!("git: {}", e.message())))
}

/// The production backend: raw HTTP reads, git pushes.
pub struct GitRemote {
    fetcher: RawFetcher,
    writer: GitWriter,
}

impl GitRemote {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        Ok(Self {
            fetcher: RawFetcher::new(config.clone())?,
            writer: GitWriter::new(config),
        })
    }
}

#[async_trait]
impl ObjectFetcher for GitRemote {
    async fn fetch(&self, user: &Username, path: &str) -> Result<Vec<u8>> {
        self.fetcher.fetch(user, path).await
    }
}

#[async_trait]
impl RemoteBackend for GitRemote {
    fn name(&self) -> &str {
        "git"
    }

    async fn incremental_write(
        &self,
        user: &Username,
        auth: &SshCredential,
        changes: ChangeSet,
        meta: &CommitMeta,
    ) -> Result<()> {
        self.writer.incremental_write(user, auth, changes, meta).await
    }

    async fn reset_write(
        &self,
        user: &Username,
        auth: &SshCredential,
        files: BTreeMap<String, Vec<u8>>,
        meta: &CommitMeta,
    ) -> Result<()> {
        self.writer.reset_write(user, auth, files, meta).await
    }
}
