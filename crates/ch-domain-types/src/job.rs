// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Job records and their lifecycle states
//!
//! A job is created by the submission path, claimed by a worker, and
//! eventually archived into immutable history. Ownership is implicit:
//! the worker that claimed the job holds it only through the claim
//! timestamp, and a claim older than the configured lease expiry is
//! presumed abandoned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The action a job performs against the content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobAction {
    /// Sync remote content into the store
    Pull,
    /// Export store content to the remote
    Push,
    /// Open a pull request for pending changes
    #[serde(rename = "pr")]
    PullRequest,
    /// Migrate legacy content into the store
    Migrate,
    /// Delete content from the store
    Delete,
    /// Move content within the store
    Move,
}

impl std::fmt::Display for JobAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobAction::Pull => write!(f, "pull"),
            JobAction::Push => write!(f, "push"),
            JobAction::PullRequest => write!(f, "pr"),
            JobAction::Migrate => write!(f, "migrate"),
            JobAction::Delete => write!(f, "delete"),
            JobAction::Move => write!(f, "move"),
        }
    }
}

impl std::str::FromStr for JobAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pull" => Ok(JobAction::Pull),
            "push" => Ok(JobAction::Push),
            "pr" | "pullrequest" => Ok(JobAction::PullRequest),
            "migrate" => Ok(JobAction::Migrate),
            "delete" => Ok(JobAction::Delete),
            "move" => Ok(JobAction::Move),
            _ => Err(format!("unknown job action: {}", s)),
        }
    }
}

/// Lifecycle state of a job.
///
/// States only ever progress `Working` to one of the terminal states.
/// Archived jobs are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Claimed by a worker and in progress
    Working,
    /// Finished successfully
    Success,
    /// Finished with an error
    Error,
}

impl JobState {
    /// Whether the state is terminal (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Success | JobState::Error)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Working => write!(f, "working"),
            JobState::Success => write!(f, "success"),
            JobState::Error => write!(f, "error"),
        }
    }
}

/// Current status of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub state: JobState,
    /// Human-readable detail for the current state
    #[serde(default)]
    pub message: String,
    /// Unix timestamp (seconds) set when the job reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished: Option<i64>,
}

impl JobStatus {
    pub fn working() -> Self {
        Self {
            state: JobState::Working,
            message: String::new(),
            finished: None,
        }
    }
}

/// What a job does, plus its action-specific options.
///
/// The options payload is owned by the worker that executes the action;
/// the lease subsystem never inspects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub action: JobAction,
    #[serde(default)]
    pub options: serde_json::Value,
}

/// A unit of asynchronous work against the content store.
///
/// Identified by `(namespace, name)`. There is no explicit lock object;
/// `claimed_at` is the entire ownership record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub namespace: String,
    pub name: String,
    pub spec: JobSpec,
    pub status: JobStatus,
    /// When a worker claimed this job; `None` for unclaimed jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Whether the claim on this job is older than `expired_before`.
    pub fn is_expired(&self, expired_before: DateTime<Utc>) -> bool {
        match self.claimed_at {
            Some(claimed) => claimed < expired_before,
            None => false,
        }
    }
}
