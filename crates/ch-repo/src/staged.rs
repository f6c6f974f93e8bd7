// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Staged transactions
//!
//! A staged transaction batches several logical writes against one
//! open server-side staging writer, bound to the branch it was opened
//! on. What happens after each write depends on the [`StageMode`]:
//!
//! - `CommitOnEach`: commit after every write, push only if
//!   `push_on_writes` is set,
//! - `CommitAndPushOnEach`: commit and push after every write,
//! - `CommitOnlyOnce`: defer everything; one commit happens on
//!   [`StagedGitRepository::push`].
//!
//! The transaction owns its writer exclusively; all operations take
//! `&mut self` and a single owner must sequence them. Different
//! transactions and different repositories are independent.

use std::time::Duration;

use tracing::debug;

use crate::client::{ClientError, RemoteRef, StagedWriter};
use crate::error::RepositoryError;
use crate::repository::{GitRepository, DIRECTORY_SENTINEL};
use crate::retry::{retry_op, Idempotency};
use crate::types::{FileInfo, FileTreeEntry};

/// Commit message used by `CommitOnlyOnce` when none is configured.
pub const DEFAULT_STAGED_COMMIT_MESSAGE: &str = "Staged changes";

/// When commits and pushes happen within a staged transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageMode {
    /// Commit after each write; push only if `push_on_writes` is set.
    #[default]
    CommitOnEach,
    /// Commit and push after every write.
    CommitAndPushOnEach,
    /// Defer all commits; a single commit happens on `push`.
    CommitOnlyOnce,
}

/// Options for opening a staged transaction.
#[derive(Debug, Clone, Default)]
pub struct StageOptions {
    /// Branch to stage on; `None` uses the repository's configured
    /// branch. Created on demand if absent.
    pub ref_name: Option<String>,
    pub mode: StageMode,
    /// Only meaningful for `CommitOnEach`.
    pub push_on_writes: bool,
    /// Wall-clock deadline applied around the `push` path.
    pub timeout: Option<Duration>,
    /// Commit message for the single `CommitOnlyOnce` commit.
    pub commit_only_once_message: Option<String>,
}

/// An open staged transaction bound to one branch.
pub struct StagedGitRepository {
    repo: GitRepository,
    opts: StageOptions,
    branch_ref: RemoteRef,
    writer: Box<dyn StagedWriter>,
}

impl StagedGitRepository {
    pub(crate) async fn open(
        repo: GitRepository,
        opts: StageOptions,
    ) -> Result<Self, RepositoryError> {
        let branch = opts
            .ref_name
            .clone()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| repo.branch().to_string());
        let branch_ref = repo.ensure_branch_exists(&branch).await?;
        let writer = repo.open_writer(&branch_ref).await?;
        debug!(branch = %branch_ref.name, mode = ?opts.mode, "opened staged transaction");
        Ok(Self {
            repo,
            opts,
            branch_ref,
            writer,
        })
    }

    pub fn options(&self) -> &StageOptions {
        &self.opts
    }

    /// The fully qualified ref this transaction is bound to.
    pub fn branch_ref(&self) -> &RemoteRef {
        &self.branch_ref
    }

    /// A ref is usable inside this transaction when it is empty, the
    /// branch the transaction was opened on, or the repository's own
    /// configured branch.
    fn is_ref_supported(&self, ref_name: &str) -> bool {
        if ref_name.is_empty() {
            return true;
        }
        let opened = self
            .opts
            .ref_name
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| self.repo.branch());
        ref_name == opened || ref_name == self.repo.branch()
    }

    fn check_ref(&self, ref_name: &str) -> Result<(), RepositoryError> {
        if self.is_ref_supported(ref_name) {
            Ok(())
        } else {
            Err(RepositoryError::BadRequest(
                "ref is not supported for staged repository".to_string(),
            ))
        }
    }

    /// Reads through to the repository; restricted to the transaction's
    /// branch.
    pub async fn read(&self, path: &str, ref_name: &str) -> Result<FileInfo, RepositoryError> {
        self.check_ref(ref_name)?;
        self.repo.read(path, ref_name).await
    }

    /// Lists through to the repository; restricted to the transaction's
    /// branch.
    pub async fn read_tree(&self, ref_name: &str) -> Result<Vec<FileTreeEntry>, RepositoryError> {
        self.check_ref(ref_name)?;
        self.repo.read_tree(ref_name).await
    }

    /// Stages a file creation (or an empty directory via the `.keep`
    /// sentinel).
    pub async fn create(
        &mut self,
        path: &str,
        ref_name: &str,
        data: &[u8],
        message: &str,
    ) -> Result<(), RepositoryError> {
        self.check_ref(ref_name)?;

        let full = self.repo.full_path(path);
        if ch_safepath::is_dir(path) {
            if !data.is_empty() {
                return Err(RepositoryError::BadRequest(
                    "data cannot be provided for a directory".to_string(),
                ));
            }
            let sentinel = ch_safepath::join(&[&full, DIRECTORY_SENTINEL]);
            retry_op!(self.repo.retry_policy(), Idempotency::NonIdempotent, {
                self.writer.create_blob(&sentinel, &[]).await
            })
            .map_err(|err| RepositoryError::from_file_op("create blob", err))?;
        } else {
            retry_op!(self.repo.retry_policy(), Idempotency::NonIdempotent, {
                self.writer.create_blob(&full, data).await
            })
            .map_err(|err| RepositoryError::from_file_op("create blob", err))?;
        }

        self.handle_commit_and_push(message).await
    }

    /// Stages an update of an existing file.
    pub async fn update(
        &mut self,
        path: &str,
        ref_name: &str,
        data: &[u8],
        message: &str,
    ) -> Result<(), RepositoryError> {
        self.check_ref(ref_name)?;
        if ch_safepath::is_dir(path) {
            return Err(RepositoryError::BadRequest(
                "cannot update a directory in a staged repository".to_string(),
            ));
        }

        let full = self.repo.full_path(path);
        retry_op!(self.repo.retry_policy(), Idempotency::NonIdempotent, {
            self.writer.update_blob(&full, data).await
        })
        .map_err(|err| RepositoryError::from_file_op("update blob", err))?;

        self.handle_commit_and_push(message).await
    }

    /// Create-or-update against the writer's own pending state.
    pub async fn write(
        &mut self,
        path: &str,
        ref_name: &str,
        data: &[u8],
        message: &str,
    ) -> Result<(), RepositoryError> {
        self.check_ref(ref_name)?;

        let full = self.repo.full_path(path);
        let exists = retry_op!(self.repo.retry_policy(), Idempotency::Idempotent, {
            self.writer.blob_exists(&full).await
        })
        .map_err(|err| RepositoryError::transport("check if file exists", err))?;

        if exists {
            retry_op!(self.repo.retry_policy(), Idempotency::NonIdempotent, {
                self.writer.update_blob(&full, data).await
            })
            .map_err(|err| RepositoryError::from_file_op("update blob", err))?;
        } else {
            retry_op!(self.repo.retry_policy(), Idempotency::NonIdempotent, {
                self.writer.create_blob(&full, data).await
            })
            .map_err(|err| RepositoryError::from_file_op("create blob", err))?;
        }

        self.handle_commit_and_push(message).await
    }

    /// Stages a deletion of a file or directory tree.
    pub async fn delete(
        &mut self,
        path: &str,
        ref_name: &str,
        message: &str,
    ) -> Result<(), RepositoryError> {
        self.check_ref(ref_name)?;

        let full = self.repo.full_path(path);
        if ch_safepath::is_dir(path) {
            retry_op!(self.repo.retry_policy(), Idempotency::Idempotent, {
                self.writer.delete_tree(full.trim_end_matches('/')).await
            })
            .map_err(|err| RepositoryError::from_file_op("delete tree", err))?;
        } else {
            retry_op!(self.repo.retry_policy(), Idempotency::Idempotent, {
                self.writer.delete_blob(&full).await
            })
            .map_err(|err| RepositoryError::from_file_op("delete blob", err))?;
        }

        self.handle_commit_and_push(message).await
    }

    /// Stages a move. File-to-directory (or the reverse) is rejected.
    pub async fn move_file(
        &mut self,
        old_path: &str,
        new_path: &str,
        ref_name: &str,
        message: &str,
    ) -> Result<(), RepositoryError> {
        self.check_ref(ref_name)?;

        let old_is_dir = ch_safepath::is_dir(old_path);
        if old_is_dir != ch_safepath::is_dir(new_path) {
            return Err(RepositoryError::BadRequest(
                "cannot move between file and directory types".to_string(),
            ));
        }

        let full_old = self.repo.full_path(old_path);
        let full_new = self.repo.full_path(new_path);
        if old_is_dir {
            retry_op!(self.repo.retry_policy(), Idempotency::NonIdempotent, {
                self.writer
                    .move_tree(
                        full_old.trim_end_matches('/'),
                        full_new.trim_end_matches('/'),
                    )
                    .await
            })
            .map_err(|err| RepositoryError::from_file_op("move tree", err))?;
        } else {
            retry_op!(self.repo.retry_policy(), Idempotency::NonIdempotent, {
                self.writer.move_blob(&full_old, &full_new).await
            })
            .map_err(|err| RepositoryError::from_file_op("move blob", err))?;
        }

        self.handle_commit_and_push(message).await
    }

    /// Finalizes the transaction: for `CommitOnlyOnce` commits the
    /// accumulated batch first, then pushes. The transaction's timeout
    /// (if any) bounds this whole path.
    pub async fn push(&mut self) -> Result<(), RepositoryError> {
        let timeout = self.opts.timeout;
        let fut = async {
            if self.opts.mode == StageMode::CommitOnlyOnce {
                let message = self
                    .opts
                    .commit_only_once_message
                    .clone()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| DEFAULT_STAGED_COMMIT_MESSAGE.to_string());
                self.commit(&message).await?;
            }
            self.push_writer().await
        };

        match timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(RepositoryError::Timeout),
            },
            None => fut.await,
        }
    }

    /// Releases server-side staging resources, whether or not anything
    /// was committed or pushed.
    pub async fn remove(&mut self) -> Result<(), RepositoryError> {
        retry_op!(self.repo.retry_policy(), Idempotency::Idempotent, {
            self.writer.cleanup().await
        })
        .map_err(|err| RepositoryError::transport("cleanup staged writer", err))
    }

    async fn handle_commit_and_push(&mut self, message: &str) -> Result<(), RepositoryError> {
        match self.opts.mode {
            StageMode::CommitOnlyOnce => Ok(()),
            StageMode::CommitOnEach => {
                self.commit(message).await?;
                if self.opts.push_on_writes {
                    self.push_writer().await?;
                }
                Ok(())
            }
            StageMode::CommitAndPushOnEach => {
                self.commit(message).await?;
                self.push_writer().await
            }
        }
    }

    async fn commit(&mut self, message: &str) -> Result<(), RepositoryError> {
        let signature = self.repo.signature();
        retry_op!(self.repo.retry_policy(), Idempotency::NonIdempotent, {
            self.writer.commit(message, &signature, &signature).await
        })
        .map_err(|err| match err {
            ClientError::NothingToCommit => RepositoryError::NothingToCommit,
            other => RepositoryError::transport("commit changes", other),
        })?;
        Ok(())
    }

    async fn push_writer(&mut self) -> Result<(), RepositoryError> {
        retry_op!(self.repo.retry_policy(), Idempotency::NonIdempotent, {
            self.writer.push().await
        })
        .map_err(|err| match err {
            ClientError::NothingToPush => RepositoryError::NothingToPush,
            other => RepositoryError::transport("push changes", other),
        })
    }
}
