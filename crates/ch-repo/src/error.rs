// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Store-level error taxonomy
//!
//! Callers decide create-vs-update, retry-vs-fail, and conflict
//! handling off these variants alone; message text is for humans.

use thiserror::Error;

use crate::client::ClientError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// The file (or directory) does not exist at the requested ref.
    #[error("file not found")]
    FileNotFound,

    /// The requested ref (branch or hash) does not exist.
    #[error("ref not found")]
    RefNotFound,

    /// Create-time conflict: the target already exists.
    #[error("file already exists")]
    FileAlreadyExists,

    /// The staged batch had no pending changes to commit.
    #[error("nothing to commit")]
    NothingToCommit,

    /// The staged batch had no committed changes to push.
    #[error("nothing to push")]
    NothingToPush,

    /// The remote repository has no branches at all.
    #[error("repository has no branches")]
    EmptyRepository,

    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    /// A request the store refuses up front: mismatched file/directory
    /// types, data supplied for a directory, unsupported ref in a
    /// staged transaction.
    #[error("{0}")]
    BadRequest(String),

    #[error("invalid repository configuration: {0}")]
    InvalidConfig(String),

    /// A staged push exceeded the transaction's wall-clock timeout.
    #[error("operation timed out")]
    Timeout,

    /// A transport failure that survived the retry policy.
    #[error("{context}: {source}")]
    Transport {
        context: &'static str,
        source: ClientError,
    },
}

impl RepositoryError {
    pub(crate) fn transport(context: &'static str, source: ClientError) -> Self {
        RepositoryError::Transport { context, source }
    }

    /// Maps blob/tree-level transport errors onto file semantics,
    /// wrapping anything unrecognized with `context`.
    pub(crate) fn from_file_op(context: &'static str, err: ClientError) -> Self {
        match err {
            ClientError::ObjectNotFound => RepositoryError::FileNotFound,
            ClientError::ObjectAlreadyExists => RepositoryError::FileAlreadyExists,
            other => RepositoryError::transport(context, other),
        }
    }
}
