// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Domain types for the Content Harbor provisioning core
//!
//! This crate contains the job-related domain types shared between the
//! sweeper, the workers, and any surrounding API surface. These types are
//! transport-agnostic and carry no behavior beyond simple lifecycle
//! helpers.

pub mod job;

pub use job::{Job, JobAction, JobSpec, JobState, JobStatus};
