// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store error taxonomy.
//!
//! Store failures are never mapped to a Job-level `Failed` by callers: the
//! engine retries `is_retryable` errors a small fixed number of times and
//! then aborts the whole run as a fatal condition.

use sm_core::job::InvalidTransition;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the Job and Checkpoint stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("checkpoint not found: {job_id}/{step}")]
    CheckpointNotFound { job_id: String, step: String },

    #[error("checkpoint already exists: {job_id}/{step}")]
    AlreadyExists { job_id: String, step: String },

    #[error("write conflict on job {job_id}: expected version {expected}, found {found}")]
    Conflict { job_id: String, expected: u64, found: u64 },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("step not in pipeline order: {0}")]
    UnknownStep(String),

    #[error("invalid step name: {0}")]
    InvalidStepName(String),

    #[error("store directory is locked by another process: {0}")]
    Locked(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether the caller may usefully retry the operation.
    ///
    /// Conflicts and IO failures are transient; everything else reflects a
    /// caller bug or a genuine absence and retrying cannot change it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict { .. } | StoreError::Io(_))
    }
}
