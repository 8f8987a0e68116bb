// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job store contract.

use crate::error::StoreResult;
use sm_core::{Job, JobId, JobStatus, Metadata};

/// Durable table of job records.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn JobStore>`.
/// Writes to the same job are serialized per-job: concurrent updates either
/// queue or fail with `Conflict`; a status transition is never silently
/// overwritten by a stale writer.
pub trait JobStore: Send + Sync {
    /// Create a new job record in `Created` status.
    fn create(&self, kind: &str, metadata: Metadata) -> StoreResult<Job>;

    /// Fetch a job by id.
    ///
    /// # Errors
    ///
    /// `JobNotFound` when no record exists.
    fn get(&self, id: &JobId) -> StoreResult<Job>;

    /// Apply a status transition, stamping `updated_at` unconditionally.
    ///
    /// This is the *only* way status changes. `error` is stored only for
    /// `Failed`. Returns the updated record.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` for transitions the state machine forbids,
    /// `Conflict` when a concurrent writer got there first.
    fn update_status(&self, id: &JobId, next: JobStatus, error: Option<&str>) -> StoreResult<Job>;

    /// Merge one metadata key into the job record.
    fn update_metadata(&self, id: &JobId, key: &str, value: serde_json::Value) -> StoreResult<Job>;

    /// All jobs, in unspecified order.
    fn list(&self) -> StoreResult<Vec<Job>>;

    /// Jobs currently in the given status.
    fn list_by_status(&self, status: JobStatus) -> StoreResult<Vec<Job>>;
}
