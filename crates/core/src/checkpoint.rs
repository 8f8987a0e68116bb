// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint record: durable proof one step of one job completed.

use crate::clock::Clock;
use crate::id::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Proof that one named step of one job has completed successfully.
///
/// At most one checkpoint per `(job_id, step_name)` pair exists at any
/// time. A checkpoint is written exactly once, after the step has durably
/// produced its artifact; a forced re-run must delete it first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub job_id: JobId,
    /// Unique within a pipeline configuration
    pub step_name: String,
    pub completed_at: DateTime<Utc>,
    /// Opaque reference (path, key, or small embedded value) the next step
    /// uses to locate this step's artifact
    pub output_ref: String,
}

impl Checkpoint {
    pub fn new(
        job_id: JobId,
        step_name: impl Into<String>,
        output_ref: impl Into<String>,
        clock: &impl Clock,
    ) -> Self {
        Self {
            job_id,
            step_name: step_name.into(),
            completed_at: clock.now_utc(),
            output_ref: output_ref.into(),
        }
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
