// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Read-side projections of store content

use serde::{Deserialize, Serialize};

use crate::client::ObjectHash;

/// A single file (or directory) read from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Repository-relative path as the caller asked for it
    pub path: String,
    /// The ref the caller asked for, verbatim (may be empty)
    pub ref_name: String,
    pub hash: ObjectHash,
    /// Blob payload; `None` for directories
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

/// One entry of a scoped tree listing. Directory entries carry a
/// trailing `/` in `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTreeEntry {
    pub path: String,
    pub hash: ObjectHash,
    pub blob: bool,
}

/// The three-valued change action a diff entry maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    Created,
    Updated,
    Deleted,
}

/// One changed file between two refs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedFileChange {
    pub path: String,
    /// The ref the change was observed on
    pub ref_name: String,
    pub action: FileAction,
    /// For deletions, where the file used to live
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_ref: Option<String>,
}

/// Outcome of a repository health test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestResults {
    pub success: bool,
    pub failures: Vec<TestFailure>,
}

impl TestResults {
    pub fn ok() -> Self {
        Self {
            success: true,
            failures: Vec::new(),
        }
    }

    pub fn failed(field: &'static str, detail: String) -> Self {
        Self {
            success: false,
            failures: vec![TestFailure { field, detail }],
        }
    }
}

/// One failed health check, attributed to the configuration field a
/// fix would touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestFailure {
    pub field: &'static str,
    pub detail: String,
}
