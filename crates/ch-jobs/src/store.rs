// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Job store seams supplied by the surrounding platform

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use ch_domain_types::Job;

/// Errors from the platform's job store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobStoreError {
    /// The job is no longer in the active queue. During a sweep this
    /// means another process completed it first and is treated as
    /// success.
    #[error("job not found")]
    NotFound,

    #[error("job store error: {0}")]
    Storage(String),
}

/// Lists active jobs whose claim has gone stale.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobLister: Send + Sync {
    /// Jobs claimed before `expired_before`, at most `limit` of them.
    async fn list_expired_jobs(
        &self,
        expired_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Job>, JobStoreError>;
}

/// Archives a finalized job: moves it to immutable history and removes
/// it from the active queue, atomically.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobCompleter: Send + Sync {
    async fn complete(&self, job: &Job) -> Result<(), JobStoreError>;
}
