// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! A prefix tree over path segments
//!
//! The trie answers "does this path exist, and as what?" while
//! enforcing that no path is ever both a file and a directory. Callers
//! build one per sync operation to detect collisions between incoming
//! writes before any of them reach the store.
//!
//! A `Trie` instance is owned by a single caller; it is not internally
//! synchronized.

use std::collections::HashMap;

use thiserror::Error;

use crate::path::clean;

/// A file/directory conflict found during insertion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrieError {
    /// The named path is a file; it cannot be a directory or be
    /// extended with children.
    #[error("path {0} already exists as a file")]
    FileConflict(String),

    /// The named path is a directory; it cannot be a file.
    #[error("path {0} already exists as a directory")]
    DirectoryConflict(String),
}

#[derive(Debug, Default)]
struct Node {
    children: HashMap<String, Node>,
    file: bool,
    dir: bool,
}

/// Existence index over repository-relative paths.
#[derive(Debug, Default)]
pub struct Trie {
    root: Node,
}

impl Trie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a path, recording ancestors as intermediate nodes and the
    /// leaf as terminal-file (no trailing `/`) or terminal-directory
    /// (trailing `/`).
    ///
    /// Re-inserting an existing path is a no-op. Conflicts are checked
    /// before anything is recorded, so a failed insert leaves the trie
    /// untouched.
    pub fn insert(&mut self, path: &str) -> Result<(), TrieError> {
        let cleaned = clean(path);
        if cleaned.is_empty() {
            return Ok(());
        }
        let as_dir = cleaned.ends_with('/');
        let trimmed = cleaned.trim_end_matches('/');
        let segments: Vec<&str> = trimmed.split('/').collect();

        self.check_conflicts(&segments, as_dir)?;

        let mut node = &mut self.root;
        for (i, segment) in segments.iter().enumerate() {
            node = node.children.entry((*segment).to_string()).or_default();
            if i == segments.len() - 1 {
                if as_dir {
                    node.dir = true;
                } else {
                    node.file = true;
                }
            }
        }
        Ok(())
    }

    /// Whether the path exists. A trailing `/` queries directory
    /// existence, otherwise file existence. The root always exists.
    pub fn exists(&self, path: &str) -> bool {
        let cleaned = clean(path);
        if cleaned.is_empty() {
            return true;
        }
        let as_dir = cleaned.ends_with('/');
        let trimmed = cleaned.trim_end_matches('/');

        let mut node = &self.root;
        for segment in trimmed.split('/') {
            match node.children.get(segment) {
                Some(child) => node = child,
                None => return false,
            }
        }

        if as_dir {
            // Ancestors of inserted paths count as directories even
            // without an explicit terminal marker.
            node.dir || !node.children.is_empty()
        } else {
            node.file
        }
    }

    fn check_conflicts(&self, segments: &[&str], as_dir: bool) -> Result<(), TrieError> {
        let mut node = &self.root;
        let mut prefix = String::new();
        for (i, segment) in segments.iter().enumerate() {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);

            let child = match node.children.get(*segment) {
                Some(child) => child,
                // The remainder of the path is new; nothing left to
                // conflict with.
                None => return Ok(()),
            };

            let last = i == segments.len() - 1;
            if last {
                if as_dir && child.file {
                    return Err(TrieError::FileConflict(prefix));
                }
                if !as_dir && (child.dir || !child.children.is_empty()) {
                    return Err(TrieError::DirectoryConflict(prefix));
                }
            } else if child.file {
                return Err(TrieError::FileConflict(prefix));
            }
            node = child;
        }
        Ok(())
    }
}
