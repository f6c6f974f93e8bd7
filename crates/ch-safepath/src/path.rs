// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Path validation rules and lexical path utilities
//!
//! Validation is purely lexical: no filesystem or store access happens
//! here. Each rule maps to its own [`PathError`] kind so callers can
//! report precisely what was wrong without parsing message text.

use thiserror::Error;

/// Maximum accepted path length, in bytes.
pub const MAX_PATH_LENGTH: usize = 1024;

/// Hidden segment names the store itself is allowed to write.
///
/// `.keep` is the empty-directory sentinel blob.
const PERMITTED_HIDDEN: &[&str] = &[".keep"];

/// Why a path was rejected. One kind per rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path exceeds maximum length of {MAX_PATH_LENGTH} bytes")]
    TooLong,

    #[error("path contains a percent character")]
    PercentChar,

    #[error("path contains invalid characters")]
    InvalidCharacters,

    #[error("path contains a doubled slash")]
    DoubleSlash,

    #[error("path contains a traversal component (. or ..)")]
    Traversal,

    #[error("path contains a hidden segment: {0}")]
    HiddenPath(String),
}

/// Validates a repository-relative path.
///
/// The empty path is valid and denotes the repository root. Rules are
/// checked in a fixed order and the first violation wins:
/// length, percent, character set, doubled slash, traversal, hidden
/// segments.
pub fn is_safe(path: &str) -> Result<(), PathError> {
    if path.is_empty() {
        return Ok(());
    }

    if path.len() > MAX_PATH_LENGTH {
        return Err(PathError::TooLong);
    }

    // Checked before the character set so percent-encoded traversal and
    // control bytes get their own error kind.
    if path.contains('%') {
        return Err(PathError::PercentChar);
    }

    if !path
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ' '))
    {
        return Err(PathError::InvalidCharacters);
    }

    if path.contains("//") {
        return Err(PathError::DoubleSlash);
    }

    for segment in path.split('/') {
        if segment == "." || segment == ".." {
            return Err(PathError::Traversal);
        }
    }

    for segment in path.split('/') {
        if segment.starts_with('.') && !PERMITTED_HIDDEN.contains(&segment) {
            return Err(PathError::HiddenPath(segment.to_string()));
        }
    }

    Ok(())
}

/// Whether a path refers to a directory.
///
/// A trailing `/` is the sole directory marker; the empty path is the
/// root directory.
pub fn is_dir(path: &str) -> bool {
    path.is_empty() || path.ends_with('/')
}

/// Lexically normalizes a path.
///
/// Backslashes become `/`, empty and `.` segments collapse, `..`
/// segments pop their parent, and the root collapses to `""`. A
/// trailing `/` on a non-root input survives normalization, so
/// directory-ness is preserved. Idempotent: `clean(clean(p)) ==
/// clean(p)`.
pub fn clean(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let want_trailing = normalized.ends_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in normalized.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return String::new();
    }

    let mut out = segments.join("/");
    if want_trailing {
        out.push('/');
    }
    out
}

/// Joins path elements with `/` and normalizes the result.
///
/// Unlike a plain string join, the trailing `/` of the final non-empty
/// element is preserved so joining onto a directory path yields a
/// directory path.
pub fn join(parts: &[&str]) -> String {
    let joined: Vec<&str> = parts.iter().copied().filter(|p| !p.is_empty()).collect();
    clean(&joined.join("/"))
}

/// Number of segments in a path. The root has depth zero.
pub fn depth(path: &str) -> usize {
    let cleaned = clean(path);
    let trimmed = cleaned.trim_end_matches('/');
    if trimmed.is_empty() {
        0
    } else {
        trimmed.split('/').count()
    }
}

/// Invokes `f` once per ancestor directory of `path`, shallowest first.
///
/// Each ancestor is passed with its trailing `/`; the leaf itself is
/// not visited. Useful for pre-creating parent directories before a
/// write.
pub fn walk<E, F>(path: &str, mut f: F) -> Result<(), E>
where
    F: FnMut(&str) -> Result<(), E>,
{
    let cleaned = clean(path);
    let trimmed = cleaned.trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(());
    }

    let segments: Vec<&str> = trimmed.split('/').collect();
    let mut prefix = String::new();
    for segment in &segments[..segments.len() - 1] {
        prefix.push_str(segment);
        prefix.push('/');
        f(&prefix)?;
    }
    Ok(())
}

/// Orders paths by depth with an alphabetical tie-break.
///
/// Shallowest first by default; pass `deepest_first` to invert, e.g.
/// when deleting directory contents before their parents.
pub fn sort_by_depth(paths: &mut [String], deepest_first: bool) {
    paths.sort_by(|a, b| {
        let (da, db) = (depth(a), depth(b));
        let by_depth = if deepest_first {
            db.cmp(&da)
        } else {
            da.cmp(&db)
        };
        by_depth.then_with(|| a.cmp(b))
    });
}
