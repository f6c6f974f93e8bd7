// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Git-protocol content store
//!
//! This crate is the transactional content-store layer of the Content
//! Harbor provisioning core. It speaks to a git server through the
//! [`GitClient`] transport seam and layers on top of it:
//!
//! - ref resolution (branch names, short and full object hashes) and
//!   on-demand branch creation from the configured default branch,
//! - scoped reads and writes: every logical path lives under the
//!   repository's configured sub-path prefix, and anything outside the
//!   prefix is invisible,
//! - retryable network operations with jittered exponential backoff,
//! - batched "staged" transactions with selectable commit/push
//!   semantics,
//! - diffing between two refs projected onto created/updated/deleted
//!   change records.
//!
//! The actual transport (HTTP smart protocol, SSH, a test double) is
//! supplied by the platform; this crate never opens sockets itself.

pub mod client;
pub mod config;
pub mod error;
pub mod repository;
pub mod retry;
pub mod staged;
pub mod types;

pub use client::{
    Blob, ClientError, Commit, CommitFile, CommitSignature, FileStatus, FlatTree, FlatTreeEntry,
    GitClient, ObjectHash, ObjectKind, RemoteRef, StagedWriter, Tree,
};
pub use config::{is_valid_branch_name, is_valid_git_url, ConfigFailure, RepositoryConfig};
pub use error::RepositoryError;
pub use repository::GitRepository;
pub use retry::{Idempotency, RetryPolicy};
pub use staged::{StageMode, StageOptions, StagedGitRepository, DEFAULT_STAGED_COMMIT_MESSAGE};
pub use types::{FileAction, FileInfo, FileTreeEntry, TestFailure, TestResults, VersionedFileChange};
