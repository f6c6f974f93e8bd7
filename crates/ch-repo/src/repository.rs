// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The scoped, retrying git repository
//!
//! `GitRepository` is the store-facing surface: reads, writes, diffs,
//! and branch management, all scoped under the configured sub-path
//! prefix and run through the retry policy. Direct write operations
//! open a one-shot staging session, apply the change, commit, and
//! push; batched work goes through [`crate::staged`] instead.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::client::{
    ClientError, CommitSignature, FileStatus, GitClient, ObjectHash, ObjectKind, RemoteRef,
    StagedWriter,
};
use crate::config::{is_valid_branch_name, RepositoryConfig};
use crate::error::RepositoryError;
use crate::retry::{retry_op, Idempotency, RetryPolicy};
use crate::staged::{StageOptions, StagedGitRepository};
use crate::types::{FileAction, FileInfo, FileTreeEntry, TestResults, VersionedFileChange};

/// Fully qualified branch ref namespace.
pub(crate) const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// Name of the empty sentinel blob that makes empty directories
/// representable.
pub(crate) const DIRECTORY_SENTINEL: &str = ".keep";

/// A git-backed content store scoped to one repository root.
#[derive(Clone)]
pub struct GitRepository {
    config: RepositoryConfig,
    client: Arc<dyn GitClient>,
    retry: RetryPolicy,
}

impl fmt::Debug for GitRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitRepository")
            .field("config", &self.config)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl GitRepository {
    /// Validates the configuration and builds a repository with the
    /// default retry policy.
    pub fn new(
        config: RepositoryConfig,
        client: Arc<dyn GitClient>,
    ) -> Result<Self, RepositoryError> {
        if let Some(failure) = config.validate().into_iter().next() {
            return Err(RepositoryError::InvalidConfig(format!(
                "{}: {}",
                failure.field, failure.detail
            )));
        }
        Ok(Self {
            config,
            client,
            retry: RetryPolicy::default(),
        })
    }

    /// Replaces the retry policy. Mostly useful for tests and batch
    /// tooling that wants tighter budgets.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn branch(&self) -> &str {
        &self.config.branch
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub(crate) fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub(crate) fn signature(&self) -> CommitSignature {
        self.config.signature()
    }

    /// Health check: credentials, repository existence, configured
    /// branch. Domain findings land in the result, not in the error.
    pub async fn test(&self) -> Result<TestResults, RepositoryError> {
        match retry_op!(self.retry, Idempotency::Idempotent, {
            self.client.is_authorized().await
        }) {
            Err(err) => {
                return Ok(TestResults::failed(
                    "token",
                    format!("failed check if authorized: {err}"),
                ))
            }
            Ok(false) => return Ok(TestResults::failed("token", "not authorized".to_string())),
            Ok(true) => {}
        }

        match retry_op!(self.retry, Idempotency::Idempotent, {
            self.client.repo_exists().await
        }) {
            Err(err) => {
                return Ok(TestResults::failed(
                    "url",
                    format!("failed check if repository exists: {err}"),
                ))
            }
            Ok(false) => return Ok(TestResults::failed("url", "repository not found".to_string())),
            Ok(true) => {}
        }

        let branch_ref = format!("{BRANCH_REF_PREFIX}{}", self.config.branch);
        match retry_op!(self.retry, Idempotency::Idempotent, {
            self.client.get_ref(&branch_ref).await
        }) {
            Err(ClientError::ObjectNotFound) => {
                Ok(TestResults::failed("branch", "branch not found".to_string()))
            }
            Err(err) => Ok(TestResults::failed(
                "branch",
                format!("failed to check if branch exists: {err}"),
            )),
            Ok(_) => Ok(TestResults::ok()),
        }
    }

    /// Resolves a ref string to a commit hash.
    ///
    /// Empty refs mean the configured branch. Anything that parses as a
    /// non-zero object hash is used directly; everything else is
    /// treated as a branch name (prefixed with `refs/heads/` unless
    /// already fully qualified) and resolved against the remote.
    pub async fn resolve_ref(&self, ref_name: &str) -> Result<ObjectHash, RepositoryError> {
        let name = if ref_name.is_empty() {
            self.config.branch.as_str()
        } else {
            ref_name
        };

        if let Some(hash) = ObjectHash::from_hex(name) {
            if !hash.is_zero() {
                return Ok(hash);
            }
        }

        let full = if name.starts_with("refs/") {
            name.to_string()
        } else {
            format!("{BRANCH_REF_PREFIX}{name}")
        };

        match retry_op!(self.retry, Idempotency::Idempotent, {
            self.client.get_ref(&full).await
        }) {
            Ok(remote) => Ok(remote.hash),
            Err(ClientError::ObjectNotFound) => Err(RepositoryError::RefNotFound),
            Err(err) => Err(RepositoryError::transport("resolve ref", err)),
        }
    }

    /// Picks the repository's default branch from one ref listing:
    /// `main`, then `master`, then the alphabetically first branch.
    pub async fn get_default_branch(&self) -> Result<String, RepositoryError> {
        let refs = retry_op!(self.retry, Idempotency::Idempotent, {
            self.client.list_refs().await
        })
        .map_err(|err| RepositoryError::transport("list refs", err))?;

        let mut has_main = false;
        let mut has_master = false;
        let mut first: Option<String> = None;

        for remote in &refs {
            let Some(name) = remote.name.strip_prefix(BRANCH_REF_PREFIX) else {
                continue;
            };
            match name {
                "main" => has_main = true,
                "master" => has_master = true,
                _ => {}
            }
            if first.as_deref().map_or(true, |current| name < current) {
                first = Some(name.to_string());
            }
        }

        if has_main {
            Ok("main".to_string())
        } else if has_master {
            Ok("master".to_string())
        } else {
            first.ok_or(RepositoryError::EmptyRepository)
        }
    }

    /// Reads a file (blob payload included) or a directory (hash only)
    /// at the given ref.
    pub async fn read(&self, path: &str, ref_name: &str) -> Result<FileInfo, RepositoryError> {
        let commit_hash = self.resolve_ref(ref_name).await?;
        let commit = retry_op!(self.retry, Idempotency::Idempotent, {
            self.client.get_commit(&commit_hash).await
        })
        .map_err(|err| RepositoryError::transport("get commit", err))?;

        let full = self.full_path(path);
        if ch_safepath::is_dir(path) {
            let tree = retry_op!(self.retry, Idempotency::Idempotent, {
                self.client
                    .get_tree_by_path(&commit.tree, full.trim_end_matches('/'))
                    .await
            })
            .map_err(|err| RepositoryError::from_file_op("get tree by path", err))?;
            Ok(FileInfo {
                path: path.to_string(),
                ref_name: ref_name.to_string(),
                hash: tree.hash,
                data: None,
            })
        } else {
            let blob = retry_op!(self.retry, Idempotency::Idempotent, {
                self.client.get_blob_by_path(&commit.tree, &full).await
            })
            .map_err(|err| RepositoryError::from_file_op("get blob by path", err))?;
            Ok(FileInfo {
                path: path.to_string(),
                ref_name: ref_name.to_string(),
                hash: blob.hash,
                data: Some(blob.content),
            })
        }
    }

    /// Lists every entry under the configured sub-path at the given
    /// ref. Entries outside the prefix are simply not in scope.
    pub async fn read_tree(&self, ref_name: &str) -> Result<Vec<FileTreeEntry>, RepositoryError> {
        let commit_hash = self.resolve_ref(ref_name).await?;
        let flat = retry_op!(self.retry, Idempotency::Idempotent, {
            self.client.get_flat_tree(&commit_hash).await
        })
        .map_err(|err| match err {
            ClientError::ObjectNotFound => RepositoryError::RefNotFound,
            other => RepositoryError::transport("get flat tree", other),
        })?;

        let mut entries = Vec::new();
        for entry in flat.entries {
            let Some(mut relative) = self.scoped_path(&entry.path) else {
                continue;
            };
            let blob = entry.kind == ObjectKind::Blob;
            if !blob {
                relative.push('/');
            }
            entries.push(FileTreeEntry {
                path: relative,
                hash: entry.hash,
                blob,
            });
        }
        Ok(entries)
    }

    /// Creates a file, or an empty directory via the `.keep` sentinel.
    pub async fn create(
        &self,
        path: &str,
        ref_name: &str,
        data: &[u8],
        message: &str,
    ) -> Result<(), RepositoryError> {
        let branch_ref = self.ensure_branch_exists(self.target_branch(ref_name)).await?;
        let mut writer = self.open_writer(&branch_ref).await?;

        let full = self.full_path(path);
        if ch_safepath::is_dir(path) {
            if !data.is_empty() {
                return Err(RepositoryError::BadRequest(
                    "data cannot be provided for a directory".to_string(),
                ));
            }
            let sentinel = ch_safepath::join(&[&full, DIRECTORY_SENTINEL]);
            retry_op!(self.retry, Idempotency::NonIdempotent, {
                writer.create_blob(&sentinel, &[]).await
            })
            .map_err(|err| RepositoryError::from_file_op("create blob", err))?;
        } else {
            retry_op!(self.retry, Idempotency::NonIdempotent, {
                writer.create_blob(&full, data).await
            })
            .map_err(|err| RepositoryError::from_file_op("create blob", err))?;
        }

        self.commit_and_push(writer.as_mut(), message).await
    }

    /// Updates an existing file. Directories cannot be updated.
    pub async fn update(
        &self,
        path: &str,
        ref_name: &str,
        data: &[u8],
        message: &str,
    ) -> Result<(), RepositoryError> {
        if ch_safepath::is_dir(path) {
            return Err(RepositoryError::BadRequest(
                "cannot update a directory".to_string(),
            ));
        }

        let branch_ref = self.ensure_branch_exists(self.target_branch(ref_name)).await?;
        let mut writer = self.open_writer(&branch_ref).await?;

        let full = self.full_path(path);
        retry_op!(self.retry, Idempotency::NonIdempotent, {
            writer.update_blob(&full, data).await
        })
        .map_err(|err| RepositoryError::from_file_op("update blob", err))?;

        self.commit_and_push(writer.as_mut(), message).await
    }

    /// Create-or-update. Writing content identical to what is already
    /// stored is a no-op, so repeated syncs do not produce empty
    /// commits.
    pub async fn write(
        &self,
        path: &str,
        ref_name: &str,
        data: &[u8],
        message: &str,
    ) -> Result<(), RepositoryError> {
        match self.read(path, ref_name).await {
            Ok(existing) => {
                if existing.data.as_deref() == Some(data) {
                    debug!(path, "content unchanged, skipping write");
                    return Ok(());
                }
                self.update(path, ref_name, data, message).await
            }
            Err(RepositoryError::FileNotFound) => self.create(path, ref_name, data, message).await,
            Err(other) => Err(other),
        }
    }

    /// Deletes a file or a whole directory tree.
    pub async fn delete(
        &self,
        path: &str,
        ref_name: &str,
        message: &str,
    ) -> Result<(), RepositoryError> {
        let branch_ref = self.ensure_branch_exists(self.target_branch(ref_name)).await?;
        let mut writer = self.open_writer(&branch_ref).await?;

        let full = self.full_path(path);
        if ch_safepath::is_dir(path) {
            retry_op!(self.retry, Idempotency::Idempotent, {
                writer.delete_tree(full.trim_end_matches('/')).await
            })
            .map_err(|err| RepositoryError::from_file_op("delete tree", err))?;
        } else {
            retry_op!(self.retry, Idempotency::Idempotent, {
                writer.delete_blob(&full).await
            })
            .map_err(|err| RepositoryError::from_file_op("delete blob", err))?;
        }

        self.commit_and_push(writer.as_mut(), message).await
    }

    /// Moves a file to a file or a directory to a directory. Mixed
    /// moves are rejected before any transport traffic.
    pub async fn move_file(
        &self,
        old_path: &str,
        new_path: &str,
        ref_name: &str,
        message: &str,
    ) -> Result<(), RepositoryError> {
        let old_is_dir = ch_safepath::is_dir(old_path);
        if old_is_dir != ch_safepath::is_dir(new_path) {
            return Err(RepositoryError::BadRequest(
                "cannot move between file and directory types".to_string(),
            ));
        }

        let branch_ref = self.ensure_branch_exists(self.target_branch(ref_name)).await?;
        let mut writer = self.open_writer(&branch_ref).await?;

        let full_old = self.full_path(old_path);
        let full_new = self.full_path(new_path);
        if old_is_dir {
            retry_op!(self.retry, Idempotency::NonIdempotent, {
                writer
                    .move_tree(
                        full_old.trim_end_matches('/'),
                        full_new.trim_end_matches('/'),
                    )
                    .await
            })
            .map_err(|err| RepositoryError::from_file_op("move tree", err))?;
        } else {
            retry_op!(self.retry, Idempotency::NonIdempotent, {
                writer.move_blob(&full_old, &full_new).await
            })
            .map_err(|err| RepositoryError::from_file_op("move blob", err))?;
        }

        self.commit_and_push(writer.as_mut(), message).await
    }

    /// Diffs two refs and projects the result onto create/update/delete
    /// actions, scoped to the configured sub-path. An empty base
    /// compares against the empty tree; an empty ref is an error.
    pub async fn compare_files(
        &self,
        base: &str,
        ref_name: &str,
    ) -> Result<Vec<VersionedFileChange>, RepositoryError> {
        if ref_name.is_empty() {
            let detail = if base.is_empty() {
                "base and ref cannot be empty"
            } else {
                "ref cannot be empty"
            };
            return Err(RepositoryError::BadRequest(detail.to_string()));
        }

        let base_hash = if base.is_empty() {
            ObjectHash::zero()
        } else {
            self.resolve_ref(base).await?
        };
        let ref_hash = self.resolve_ref(ref_name).await?;

        let files = retry_op!(self.retry, Idempotency::Idempotent, {
            self.client.compare_commits(&base_hash, &ref_hash).await
        })
        .map_err(|err| RepositoryError::transport("compare commits", err))?;

        let mut changes = Vec::new();
        for file in files {
            let Some(relative) = self.scoped_path(&file.path) else {
                continue;
            };
            let action = match file.status {
                FileStatus::Added => FileAction::Created,
                FileStatus::Modified | FileStatus::TypeChanged => FileAction::Updated,
                FileStatus::Deleted => FileAction::Deleted,
            };
            let deleted = action == FileAction::Deleted;
            changes.push(VersionedFileChange {
                path: relative.clone(),
                ref_name: ref_name.to_string(),
                action,
                previous_path: deleted.then(|| relative.clone()),
                previous_ref: deleted.then(|| base.to_string()),
            });
        }
        Ok(changes)
    }

    /// Opens a staged transaction. See [`crate::staged`].
    pub async fn stage(&self, opts: StageOptions) -> Result<StagedGitRepository, RepositoryError> {
        StagedGitRepository::open(self.clone(), opts).await
    }

    /// Resolves a branch ref, creating the branch from the configured
    /// branch's current tip when it does not exist yet. Branch names
    /// are validated before any transport traffic.
    pub(crate) async fn ensure_branch_exists(
        &self,
        branch: &str,
    ) -> Result<RemoteRef, RepositoryError> {
        if !is_valid_branch_name(branch) {
            return Err(RepositoryError::InvalidBranchName(branch.to_string()));
        }

        let full = format!("{BRANCH_REF_PREFIX}{branch}");
        match retry_op!(self.retry, Idempotency::Idempotent, {
            self.client.get_ref(&full).await
        }) {
            Ok(remote) => return Ok(remote),
            Err(ClientError::ObjectNotFound) => {}
            Err(err) => return Err(RepositoryError::transport("check branch exists", err)),
        }

        let source_name = format!("{BRANCH_REF_PREFIX}{}", self.config.branch);
        let source = retry_op!(self.retry, Idempotency::Idempotent, {
            self.client.get_ref(&source_name).await
        })
        .map_err(|err| RepositoryError::transport("get source branch ref", err))?;

        retry_op!(self.retry, Idempotency::NonIdempotent, {
            self.client.create_ref(&full, &source.hash).await
        })
        .map_err(|err| RepositoryError::transport("create branch", err))?;

        debug!(branch, source = %self.config.branch, "created branch on demand");
        Ok(RemoteRef {
            name: full,
            hash: source.hash,
        })
    }

    pub(crate) async fn open_writer(
        &self,
        branch_ref: &RemoteRef,
    ) -> Result<Box<dyn StagedWriter>, RepositoryError> {
        retry_op!(self.retry, Idempotency::NonIdempotent, {
            self.client.new_staged_writer(branch_ref).await
        })
        .map_err(|err| RepositoryError::transport("create staged writer", err))
    }

    pub(crate) async fn commit_and_push(
        &self,
        writer: &mut dyn StagedWriter,
        message: &str,
    ) -> Result<(), RepositoryError> {
        let signature = self.signature();
        retry_op!(self.retry, Idempotency::NonIdempotent, {
            writer.commit(message, &signature, &signature).await
        })
        .map_err(|err| match err {
            ClientError::NothingToCommit => RepositoryError::NothingToCommit,
            other => RepositoryError::transport("commit changes", other),
        })?;

        retry_op!(self.retry, Idempotency::NonIdempotent, {
            writer.push().await
        })
        .map_err(|err| match err {
            ClientError::NothingToPush => RepositoryError::NothingToPush,
            other => RepositoryError::transport("push changes", other),
        })
    }

    fn target_branch<'a>(&'a self, ref_name: &'a str) -> &'a str {
        if ref_name.is_empty() {
            &self.config.branch
        } else {
            ref_name
        }
    }

    pub(crate) fn full_path(&self, logical: &str) -> String {
        ch_safepath::join(&[&self.config.path, logical])
    }

    /// Strips the configured prefix off a raw store path. `None` means
    /// the path is outside the scope (including the prefix directory
    /// itself).
    pub(crate) fn scoped_path(&self, raw: &str) -> Option<String> {
        let prefix = self.config.path.trim_end_matches('/');
        if prefix.is_empty() {
            return Some(raw.to_string());
        }
        let rest = raw.strip_prefix(prefix)?;
        let rest = rest.strip_prefix('/')?;
        Some(rest.to_string())
    }
}
