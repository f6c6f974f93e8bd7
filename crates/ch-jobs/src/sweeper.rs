// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The lease sweeper
//!
//! One sweep ([`LeaseSweeper::cleanup`]) lists expired jobs in batches,
//! finalizes each with a terminal `Error` status, archives it through
//! the completer, and runs the first matching abandonment handler.
//! [`LeaseSweeper::run`] wraps sweeps in a ticker loop until the
//! cancellation token fires.
//!
//! The sweep interval is `3 × expiry`, clamped to `[30s, 5m]`:
//! sweeping much faster than the lease period wastes store load, while
//! sweeping slower than a few lease periods stretches worst-case
//! detection latency. The clamp bounds both ends for extreme lease
//! configurations.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ch_domain_types::{Job, JobState, JobStatus};

use crate::registry::HandlerRegistry;
use crate::store::{JobCompleter, JobLister, JobStoreError};

/// Status message stamped on jobs recovered by the sweeper.
pub const ABANDONED_JOB_MESSAGE: &str = "lease expired: worker may have crashed";

/// How many expired jobs one listing call may return. Bounds the load
/// a single sweep iteration puts on the job store.
pub const SWEEP_BATCH_SIZE: usize = 100;

const MIN_CLEANUP_INTERVAL: Duration = Duration::from_secs(30);
const MAX_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Why a sweep (or the sweep loop) stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SweepError {
    #[error("list expired jobs: {0}")]
    List(#[source] JobStoreError),

    #[error("complete job {namespace}/{name}: {source}")]
    Complete {
        namespace: String,
        name: String,
        #[source]
        source: JobStoreError,
    },

    /// The run loop observed its cancellation token.
    #[error("sweep loop canceled")]
    Canceled,
}

/// Detects and recovers jobs abandoned by crashed workers.
pub struct LeaseSweeper {
    lister: Arc<dyn JobLister>,
    completer: Arc<dyn JobCompleter>,
    registry: HandlerRegistry,
    expiry: Duration,
}

impl LeaseSweeper {
    pub fn new(
        lister: Arc<dyn JobLister>,
        completer: Arc<dyn JobCompleter>,
        registry: HandlerRegistry,
        expiry: Duration,
    ) -> Self {
        Self {
            lister,
            completer,
            registry,
            expiry,
        }
    }

    /// The sweep interval for a given lease expiry: `3 × expiry`
    /// clamped to `[30s, 5m]`.
    pub fn cleanup_interval(expiry: Duration) -> Duration {
        (expiry * 3).clamp(MIN_CLEANUP_INTERVAL, MAX_CLEANUP_INTERVAL)
    }

    fn expired_before(&self) -> DateTime<Utc> {
        let lease = chrono::Duration::from_std(self.expiry)
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX / 1_000));
        Utc::now()
            .checked_sub_signed(lease)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// One sweep over every currently expired job.
    ///
    /// A completion race (the job vanished because another process
    /// completed it) is success; any other completion failure aborts
    /// the sweep and leaves the remaining jobs for the next tick.
    /// Handler failures are logged and swallowed: the job is already
    /// archived and stays that way.
    pub async fn cleanup(&self) -> Result<(), SweepError> {
        loop {
            let batch = self
                .lister
                .list_expired_jobs(self.expired_before(), SWEEP_BATCH_SIZE)
                .await
                .map_err(SweepError::List)?;
            let batch_len = batch.len();
            if batch_len == 0 {
                return Ok(());
            }
            debug!(count = batch_len, "recovering abandoned jobs");

            for job in batch {
                let finalized = finalize(job);
                match self.completer.complete(&finalized).await {
                    Ok(()) => {}
                    Err(JobStoreError::NotFound) => {
                        debug!(
                            namespace = %finalized.namespace,
                            name = %finalized.name,
                            "job already completed by another process"
                        );
                        continue;
                    }
                    Err(source) => {
                        return Err(SweepError::Complete {
                            namespace: finalized.namespace,
                            name: finalized.name,
                            source,
                        });
                    }
                }

                info!(
                    namespace = %finalized.namespace,
                    name = %finalized.name,
                    action = %finalized.spec.action,
                    "recovered abandoned job"
                );

                if let Err(err) = self.registry.handle_abandoned(&finalized).await {
                    warn!(
                        namespace = %finalized.namespace,
                        name = %finalized.name,
                        error = %err,
                        "abandonment handler failed"
                    );
                }
            }

            if batch_len < SWEEP_BATCH_SIZE {
                return Ok(());
            }
        }
    }

    /// Blocking sweep loop: one immediate sweep, then one per interval
    /// tick, until the token is canceled. Failed sweeps are logged and
    /// retried on the next tick.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), SweepError> {
        let period = Self::cleanup_interval(self.expiry);
        info!(
            expiry_secs = self.expiry.as_secs(),
            interval_secs = period.as_secs(),
            "starting lease sweep loop"
        );

        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("lease sweep loop canceled");
                    return Err(SweepError::Canceled);
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.cleanup().await {
                        warn!(error = %err, "sweep failed; retrying on next tick");
                    }
                }
            }
        }
    }
}

/// Finalizes an abandoned job: terminal `Error` state, the fixed
/// diagnostic message, and a finish timestamp.
fn finalize(mut job: Job) -> Job {
    job.status = JobStatus {
        state: JobState::Error,
        message: ABANDONED_JOB_MESSAGE.to_string(),
        finished: Some(Utc::now().timestamp()),
    };
    job
}
