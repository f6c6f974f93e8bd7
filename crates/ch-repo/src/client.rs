// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The git-protocol transport seam
//!
//! [`GitClient`] and [`StagedWriter`] are the two traits the platform
//! must implement to back a repository. Everything in this module is
//! deliberately close to the wire: object hashes, refs, blobs, flat
//! trees, and per-file commit comparison records. The repository layer
//! above maps these onto store-level types and errors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by a transport implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("object not found")]
    ObjectNotFound,

    #[error("object already exists")]
    ObjectAlreadyExists,

    #[error("nothing to commit")]
    NothingToCommit,

    #[error("nothing to push")]
    NothingToPush,

    #[error("unauthorized")]
    Unauthorized,

    #[error("unexpected status {status}")]
    UnexpectedStatus { status: u16 },

    #[error("network error: {0}")]
    Network(String),
}

impl ClientError {
    /// Whether this error may be retried for the given operation class.
    ///
    /// Network failures and 429 responses are always worth another
    /// attempt; 5xx responses only when the operation is idempotent
    /// (reads and delete-class operations). Everything else is a real
    /// answer, not a transient condition.
    pub fn is_retryable(&self, class: crate::retry::Idempotency) -> bool {
        match self {
            ClientError::Network(_) => true,
            ClientError::UnexpectedStatus { status: 429 } => true,
            ClientError::UnexpectedStatus { status } if (500..=599).contains(status) => {
                class == crate::retry::Idempotency::Idempotent
            }
            _ => false,
        }
    }
}

/// A content-addressable object hash in hex form.
///
/// Short hashes (fewer than 40 hex digits) are accepted the way the
/// wire accepts them; the all-zero hash is the null object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectHash(String);

impl ObjectHash {
    /// Parses a hex string. Returns `None` unless the input is 2 to 40
    /// hex digits with an even length.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.is_empty() || s.len() > 40 || s.len() % 2 != 0 {
            return None;
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(s.to_ascii_lowercase()))
    }

    /// The null hash, used as the empty side of a comparison.
    pub fn zero() -> Self {
        Self("0".repeat(40))
    }

    pub fn is_zero(&self) -> bool {
        self.0.chars().all(|c| c == '0')
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A remote ref: a fully qualified name pointing at a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    /// Fully qualified, e.g. `refs/heads/main`
    pub name: String,
    pub hash: ObjectHash,
}

/// Author or committer identity on a commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitSignature {
    pub name: String,
    pub email: String,
    pub when: DateTime<Utc>,
}

/// A commit object, reduced to what the store needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub hash: ObjectHash,
    pub tree: ObjectHash,
    pub message: String,
}

/// A blob with its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub hash: ObjectHash,
    pub content: Vec<u8>,
}

/// A tree object reference (no entries; use [`FlatTree`] for listings).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pub hash: ObjectHash,
}

/// Object kind of a flat tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Tree,
}

/// One entry of a recursively flattened tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatTreeEntry {
    /// Raw repository path, unscoped
    pub path: String,
    pub hash: ObjectHash,
    pub kind: ObjectKind,
}

/// A recursively flattened tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlatTree {
    pub entries: Vec<FlatTreeEntry>,
}

/// Per-file status in a commit comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    TypeChanged,
}

/// One changed file between two commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFile {
    /// Raw repository path, unscoped
    pub path: String,
    pub status: FileStatus,
}

/// Read side of the git protocol plus staging-session creation.
///
/// Implementations must be safe to share across tasks; the repository
/// holds one behind an `Arc`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GitClient: Send + Sync {
    /// Whether the configured credentials may access the repository.
    async fn is_authorized(&self) -> Result<bool, ClientError>;

    /// Whether the remote repository exists at all.
    async fn repo_exists(&self) -> Result<bool, ClientError>;

    /// Looks up a single ref by fully qualified name.
    async fn get_ref(&self, ref_name: &str) -> Result<RemoteRef, ClientError>;

    /// Lists every ref the remote advertises.
    async fn list_refs(&self) -> Result<Vec<RemoteRef>, ClientError>;

    /// Creates a new ref pointing at an existing commit.
    async fn create_ref(&self, ref_name: &str, hash: &ObjectHash) -> Result<(), ClientError>;

    async fn get_commit(&self, hash: &ObjectHash) -> Result<Commit, ClientError>;

    /// Fetches the blob at `path` inside the tree rooted at `tree`.
    async fn get_blob_by_path(&self, tree: &ObjectHash, path: &str) -> Result<Blob, ClientError>;

    /// Fetches the subtree at `path` inside the tree rooted at `tree`.
    async fn get_tree_by_path(&self, tree: &ObjectHash, path: &str) -> Result<Tree, ClientError>;

    /// Recursively lists the tree reachable from a commit.
    async fn get_flat_tree(&self, commit: &ObjectHash) -> Result<FlatTree, ClientError>;

    /// Per-file differences between two commits. The zero hash is a
    /// valid base and compares against the empty tree.
    async fn compare_commits(
        &self,
        base: &ObjectHash,
        head: &ObjectHash,
    ) -> Result<Vec<CommitFile>, ClientError>;

    /// Opens a server-side staging session on top of a ref.
    async fn new_staged_writer(
        &self,
        branch_ref: &RemoteRef,
    ) -> Result<Box<dyn StagedWriter>, ClientError>;
}

/// A server-side batch of pending mutations against one ref.
///
/// The writer accumulates blob and tree changes; nothing is visible to
/// other readers until `commit` and `push`. Writers are stateful and
/// single-owner: all calls take `&mut self`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StagedWriter: Send {
    async fn blob_exists(&mut self, path: &str) -> Result<bool, ClientError>;

    async fn create_blob(&mut self, path: &str, data: &[u8]) -> Result<ObjectHash, ClientError>;

    async fn update_blob(&mut self, path: &str, data: &[u8]) -> Result<ObjectHash, ClientError>;

    async fn delete_blob(&mut self, path: &str) -> Result<ObjectHash, ClientError>;

    async fn delete_tree(&mut self, path: &str) -> Result<ObjectHash, ClientError>;

    async fn move_blob(&mut self, old_path: &str, new_path: &str)
        -> Result<ObjectHash, ClientError>;

    async fn move_tree(&mut self, old_path: &str, new_path: &str)
        -> Result<ObjectHash, ClientError>;

    /// Commits everything staged so far.
    async fn commit(
        &mut self,
        message: &str,
        author: &CommitSignature,
        committer: &CommitSignature,
    ) -> Result<Commit, ClientError>;

    /// Pushes committed state to the remote ref.
    async fn push(&mut self) -> Result<(), ClientError>;

    /// Releases server-side staging resources. Safe to call whether or
    /// not anything was committed.
    async fn cleanup(&mut self) -> Result<(), ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Idempotency;

    #[test]
    fn object_hash_accepts_short_and_full_hex() {
        assert!(ObjectHash::from_hex("abc123").is_some());
        assert!(ObjectHash::from_hex("abcdef1234567890abcdef1234567890abcdef12").is_some());
        assert_eq!(
            ObjectHash::from_hex("ABC123").unwrap().as_hex(),
            "abc123",
            "hex is normalized to lowercase"
        );
    }

    #[test]
    fn object_hash_rejects_bad_input() {
        assert!(ObjectHash::from_hex("").is_none());
        assert!(ObjectHash::from_hex("abc").is_none(), "odd length");
        assert!(ObjectHash::from_hex("zz").is_none(), "not hex");
        let too_long = "ab".repeat(21);
        assert!(ObjectHash::from_hex(&too_long).is_none());
    }

    #[test]
    fn zero_hash_is_zero() {
        assert!(ObjectHash::zero().is_zero());
        assert!(ObjectHash::from_hex("0000").unwrap().is_zero());
        assert!(!ObjectHash::from_hex("abc123").unwrap().is_zero());
    }

    #[test]
    fn retryability_classification() {
        let net = ClientError::Network("reset".to_string());
        assert!(net.is_retryable(Idempotency::Idempotent));
        assert!(net.is_retryable(Idempotency::NonIdempotent));

        let throttled = ClientError::UnexpectedStatus { status: 429 };
        assert!(throttled.is_retryable(Idempotency::Idempotent));
        assert!(throttled.is_retryable(Idempotency::NonIdempotent));

        let server = ClientError::UnexpectedStatus { status: 503 };
        assert!(server.is_retryable(Idempotency::Idempotent));
        assert!(!server.is_retryable(Idempotency::NonIdempotent));

        let client_side = ClientError::UnexpectedStatus { status: 404 };
        assert!(!client_side.is_retryable(Idempotency::Idempotent));
        assert!(!ClientError::Unauthorized.is_retryable(Idempotency::Idempotent));
        assert!(!ClientError::ObjectNotFound.is_retryable(Idempotency::Idempotent));
    }
}
