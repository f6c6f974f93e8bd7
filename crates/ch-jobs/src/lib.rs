// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Job lease expiry and abandonment recovery
//!
//! Workers claim jobs implicitly by stamping a claim timestamp; there
//! is no lock object. When a worker dies mid-execution its claim goes
//! stale, and the [`LeaseSweeper`] is the process that notices:
//! it lists jobs whose claim is older than the lease expiry, finalizes
//! them with a terminal `Error` state, archives them through the
//! platform's [`JobCompleter`], and hands each one to the first
//! registered [`AbandonmentHandler`] that supports its action for
//! type-specific cleanup (e.g. reverting a partial sync).
//!
//! The job store itself is an external collaborator behind the
//! [`JobLister`]/[`JobCompleter`] seams; its completion call must be
//! atomic so that two sweepers racing on the same job resolve cleanly
//! through the typed [`JobStoreError::NotFound`] condition.

pub mod registry;
pub mod store;
pub mod sweeper;

pub use registry::{AbandonmentHandler, HandlerRegistry};
pub use store::{JobCompleter, JobLister, JobStoreError};
pub use sweeper::{LeaseSweeper, SweepError, ABANDONED_JOB_MESSAGE, SWEEP_BATCH_SIZE};
