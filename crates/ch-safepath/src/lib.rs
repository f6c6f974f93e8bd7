// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Safe repository-relative paths
//!
//! Every path that reaches the content store goes through this crate
//! first. A path is a `/`-separated UTF-8 string relative to the
//! repository's configured sub-path; a trailing `/` is the sole
//! directory marker and there is no leading `/`.
//!
//! The crate has three parts:
//! - [`is_safe`] and friends: rule-based validation that rejects
//!   traversal, doubled separators, hidden segments, and encoding
//!   tricks before any write is attempted.
//! - path utilities ([`clean`], [`join`], [`walk`], [`sort_by_depth`])
//!   with directory-marker-preserving semantics.
//! - [`Trie`]: an existence index that refuses to let one path be both
//!   a file and a directory.

pub mod path;
pub mod trie;

pub use path::{
    clean, depth, is_dir, is_safe, join, sort_by_depth, walk, PathError, MAX_PATH_LENGTH,
};
pub use trie::{Trie, TrieError};
