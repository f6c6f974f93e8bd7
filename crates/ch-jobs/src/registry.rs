// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Abandonment handler registry
//!
//! Handlers are an ordered list of (capability predicate, callback)
//! pairs: registration order is priority order, the first handler
//! whose predicate matches a job's action wins, and at most one
//! handler runs per job. A job no handler supports is a normal no-op.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use ch_domain_types::{Job, JobAction};

/// Type-specific cleanup for jobs whose lease expired.
///
/// The job passed to [`handle_abandonment`](Self::handle_abandonment)
/// already carries its finalized `Error` state and message; the
/// handler must not expect to (and cannot) revert the archival.
#[async_trait]
pub trait AbandonmentHandler: Send + Sync {
    /// Whether this handler knows how to clean up after `action`.
    fn supports_action(&self, action: JobAction) -> bool;

    /// Runs the cleanup. Failures are logged by the sweeper and never
    /// propagate; the job stays archived either way.
    async fn handle_abandonment(&self, job: &Job) -> anyhow::Result<()>;
}

/// Ordered first-match dispatch over abandonment handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn AbandonmentHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler. Earlier registrations take priority.
    pub fn register(&mut self, handler: Arc<dyn AbandonmentHandler>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs the first matching handler for the job, if any.
    pub async fn handle_abandoned(&self, job: &Job) -> anyhow::Result<()> {
        let Some(handler) = self
            .handlers
            .iter()
            .find(|h| h.supports_action(job.spec.action))
        else {
            debug!(
                namespace = %job.namespace,
                name = %job.name,
                action = %job.spec.action,
                "no abandonment handler registered for action"
            );
            return Ok(());
        };
        handler.handle_abandonment(job).await
    }
}
