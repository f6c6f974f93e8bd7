// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Repository configuration and its validation
//!
//! A repository is a logical root: remote URL, default branch, a
//! sub-path prefix every operation is scoped under, and an access
//! token. Validation is collected rather than short-circuited so an
//! API surface can report every field problem at once.

use serde::{Deserialize, Serialize};

use crate::client::CommitSignature;

/// Commit identity used when no explicit author is configured.
pub const DEFAULT_AUTHOR_NAME: &str = "Content Harbor";
pub const DEFAULT_AUTHOR_EMAIL: &str = "noreply@contentharbor.dev";

/// Logical root of a git-backed content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// HTTPS remote URL
    pub url: String,
    /// Default branch; also the source for on-demand branch creation
    pub branch: String,
    /// Basic-auth username for the access token, when the remote wants
    /// one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_user: Option<String>,
    /// Access token; empty means anonymous/public access
    #[serde(default)]
    pub token: String,
    /// Sub-path prefix all operations are scoped under; empty scopes to
    /// the repository root
    #[serde(default)]
    pub path: String,
    /// Commit author override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
}

/// One field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFailure {
    pub field: &'static str,
    pub detail: String,
}

impl RepositoryConfig {
    /// Collects every validation failure in this configuration.
    pub fn validate(&self) -> Vec<ConfigFailure> {
        let mut failures = Vec::new();

        if self.url.is_empty() {
            failures.push(ConfigFailure {
                field: "url",
                detail: "a git url is required".to_string(),
            });
        } else if !is_valid_git_url(&self.url) {
            failures.push(ConfigFailure {
                field: "url",
                detail: "invalid git URL format".to_string(),
            });
        }

        if self.branch.is_empty() {
            failures.push(ConfigFailure {
                field: "branch",
                detail: "a git branch is required".to_string(),
            });
        } else if !is_valid_branch_name(&self.branch) {
            failures.push(ConfigFailure {
                field: "branch",
                detail: "invalid branch name".to_string(),
            });
        }

        if self.path.starts_with('/') {
            failures.push(ConfigFailure {
                field: "path",
                detail: "path must be relative".to_string(),
            });
        } else if let Err(err) = ch_safepath::is_safe(&self.path) {
            let detail = match err {
                ch_safepath::PathError::Traversal => {
                    "path contains traversal attempt (./ or ../)".to_string()
                }
                other => other.to_string(),
            };
            failures.push(ConfigFailure {
                field: "path",
                detail,
            });
        }

        failures
    }

    /// The commit identity writes are attributed to.
    pub fn signature(&self) -> CommitSignature {
        CommitSignature {
            name: self
                .author_name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| DEFAULT_AUTHOR_NAME.to_string()),
            email: self
                .author_email
                .clone()
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_AUTHOR_EMAIL.to_string()),
            when: chrono::Utc::now(),
        }
    }
}

/// Whether `raw` is an acceptable remote URL: https, a host, and a
/// non-empty repository path.
pub fn is_valid_git_url(raw: &str) -> bool {
    let parsed = match url::Url::parse(raw) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };
    if parsed.scheme() != "https" {
        return false;
    }
    if parsed.host_str().map_or(true, |h| h.is_empty()) {
        return false;
    }
    let path = parsed.path();
    !(path.is_empty() || path == "/")
}

/// Whether `name` is a well-formed git branch name.
///
/// This covers the refname rules that matter for branch creation:
/// no empty names, no leading or trailing `/`, no trailing `.`, no
/// `//` or `..`, no `@{`, no `.lock` suffix, and none of the
/// characters git reserves.
pub fn is_valid_branch_name(name: &str) -> bool {
    if name.is_empty() || name == "@" {
        return false;
    }
    if name.starts_with('/') || name.ends_with('/') || name.ends_with('.') {
        return false;
    }
    if name.contains("//") || name.contains("..") || name.contains("@{") {
        return false;
    }
    if name.ends_with(".lock") {
        return false;
    }
    !name.chars().any(|c| {
        c.is_ascii_control() || matches!(c, ' ' | '~' | '^' | ':' | '?' | '*' | '[' | '\\')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RepositoryConfig {
        RepositoryConfig {
            url: "https://git.example.com/owner/repo.git".to_string(),
            branch: "main".to_string(),
            token_user: None,
            token: "token123".to_string(),
            path: "configs".to_string(),
            author_name: None,
            author_email: None,
        }
    }

    #[test]
    fn valid_config_has_no_failures() {
        assert!(config().validate().is_empty());
    }

    #[test]
    fn url_validation_table() {
        let cases = [
            ("https://git.example.com/owner/repo.git", true),
            ("http://git.example.com/owner/repo.git", false),
            ("git.example.com/owner/repo.git", false),
            ("https://git.example.com/", false),
            ("https://git.example.com", false),
            ("https:///repo.git", false),
            ("://bad-url", false),
            ("not-a-url", false),
        ];
        for (url, want) in cases {
            assert_eq!(is_valid_git_url(url), want, "{url}");
        }
    }

    #[test]
    fn missing_url_and_branch_are_required() {
        let mut cfg = config();
        cfg.url = String::new();
        cfg.branch = String::new();
        let failures = cfg.validate();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].field, "url");
        assert_eq!(failures[0].detail, "a git url is required");
        assert_eq!(failures[1].field, "branch");
        assert_eq!(failures[1].detail, "a git branch is required");
    }

    #[test]
    fn branch_name_validation_table() {
        let cases = [
            ("main", true),
            ("feature/new-feature", true),
            ("release-v1.2.3", true),
            ("feature//branch", false),
            ("feature..branch", false),
            ("feature.", false),
            ("/feature", false),
            ("feature/", false),
            ("feature branch", false),
            ("feature~1", false),
            ("feature^1", false),
            ("feature:branch", false),
            ("feature?", false),
            ("feature*", false),
            ("feature[1]", false),
            ("feature\\branch", false),
            ("", false),
            ("branch.lock", false),
            ("feat@{ure}", false),
        ];
        for (name, want) in cases {
            assert_eq!(is_valid_branch_name(name), want, "{name:?}");
        }
    }

    #[test]
    fn path_validation() {
        let mut cfg = config();
        cfg.path = "../unsafe/path".to_string();
        let failures = cfg.validate();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].field, "path");
        assert_eq!(
            failures[0].detail,
            "path contains traversal attempt (./ or ../)"
        );

        cfg.path = "/absolute/path".to_string();
        let failures = cfg.validate();
        assert_eq!(failures[0].detail, "path must be relative");

        cfg.path = String::new();
        assert!(cfg.validate().is_empty(), "empty path scopes to the root");
    }

    #[test]
    fn signature_defaults_and_overrides() {
        let cfg = config();
        let sig = cfg.signature();
        assert_eq!(sig.name, DEFAULT_AUTHOR_NAME);
        assert_eq!(sig.email, DEFAULT_AUTHOR_EMAIL);

        let mut cfg = config();
        cfg.author_name = Some("Jane Doe".to_string());
        cfg.author_email = Some("jane@example.com".to_string());
        let sig = cfg.signature();
        assert_eq!(sig.name, "Jane Doe");
        assert_eq!(sig.email, "jane@example.com");

        let mut cfg = config();
        cfg.author_name = Some(String::new());
        let sig = cfg.signature();
        assert_eq!(sig.name, DEFAULT_AUTHOR_NAME, "empty override falls back");
    }
}
