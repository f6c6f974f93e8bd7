// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Retry policy for transport calls
//!
//! Exponential backoff with equal jitter: half of each delay is fixed,
//! half randomized, so synchronized workers do not hammer a recovering
//! server in lockstep. The default policy makes 8 attempts (1 initial
//! plus 7 retries) starting at 100ms and doubling up to a 5s cap,
//! bounding a fully exhausted call to roughly ten seconds.
//!
//! The policy lives as a field on the repository and is applied around
//! each transport call tree; backoff sleeps are ordinary tokio sleeps,
//! so dropping the future cancels a retry loop mid-backoff.

use std::time::Duration;

use rand::Rng;

/// Whether an operation may be replayed blindly.
///
/// Reads and delete-class operations are idempotent; blob creation,
/// commits, and pushes are not. The classification widens or narrows
/// which HTTP-level failures are retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idempotency {
    Idempotent,
    NonIdempotent,
}

/// Backoff configuration for transport retries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 8,
            initial_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries. Useful in tests and for callers
    /// that manage retries themselves.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            ..Self::default()
        }
    }

    /// Whether to retry after the given zero-based attempt failed with
    /// `err`.
    pub fn should_retry(
        &self,
        err: &crate::client::ClientError,
        class: Idempotency,
        attempt: u32,
    ) -> bool {
        attempt + 1 < self.attempts && err.is_retryable(class)
    }

    /// Delay before the retry following the given zero-based attempt.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let raw = self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let capped = raw.min(self.max_delay.as_millis() as f64);
        let half = capped / 2.0;
        let jittered = half + rand::thread_rng().gen_range(0.0..=half);
        Duration::from_millis(jittered.round() as u64)
    }
}

/// Runs a transport expression under a [`RetryPolicy`].
///
/// The expression is re-evaluated on every attempt, so it may borrow
/// (even mutably) from the surrounding scope.
macro_rules! retry_op {
    ($policy:expr, $class:expr, $op:expr) => {{
        let mut attempt: u32 = 0;
        loop {
            match $op {
                Ok(value) => break Ok(value),
                Err(err) => {
                    if !$policy.should_retry(&err, $class, attempt) {
                        break Err(err);
                    }
                    tracing::debug!(attempt, error = %err, "retrying transport call");
                    tokio::time::sleep($policy.backoff_delay(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }};
}

pub(crate) use retry_op;
