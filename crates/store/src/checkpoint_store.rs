// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint store contract.

use crate::error::StoreResult;
use sm_core::{Checkpoint, JobId};

/// Durable record of which steps have completed for a job.
///
/// Checkpoints accumulate monotonically over a job's lifetime; the only
/// deletion path is [`CheckpointStore::invalidate_from`], which a forced
/// re-run uses to drop a step and everything configured after it.
pub trait CheckpointStore: Send + Sync {
    /// Whether a checkpoint exists for `(job, step)`.
    fn has(&self, job: &JobId, step: &str) -> StoreResult<bool>;

    /// Fetch the checkpoint for `(job, step)`.
    ///
    /// # Errors
    ///
    /// `CheckpointNotFound` when the step has not completed.
    fn load(&self, job: &JobId, step: &str) -> StoreResult<Checkpoint>;

    /// Persist a checkpoint.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` when a checkpoint for `(job, step)` is already
    /// present and `overwrite` is false; an existing checkpoint is never
    /// silently replaced.
    fn put(&self, checkpoint: Checkpoint, overwrite: bool) -> StoreResult<()>;

    /// All checkpoints for a job, in unspecified order.
    fn list_for(&self, job: &JobId) -> StoreResult<Vec<Checkpoint>>;

    /// Remove the checkpoint for `step` and for every step configured to
    /// run after it in `ordered_steps`. Returns the names that actually had
    /// a checkpoint removed.
    ///
    /// # Errors
    ///
    /// `UnknownStep` when `step` does not appear in `ordered_steps`.
    fn invalidate_from(
        &self,
        job: &JobId,
        step: &str,
        ordered_steps: &[String],
    ) -> StoreResult<Vec<String>>;
}

/// The suffix of `ordered_steps` starting at `step`, or `None` when the
/// step is not in the list. Shared by store implementations.
pub(crate) fn downstream_of<'a>(step: &str, ordered_steps: &'a [String]) -> Option<&'a [String]> {
    let pos = ordered_steps.iter().position(|s| s == step)?;
    Some(&ordered_steps[pos..])
}
