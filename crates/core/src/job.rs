// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job record and status state machine.

use crate::clock::Clock;
use crate::id::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Open map of small facts steps stash on the job record.
///
/// Values are JSON scalars or small nested structures; large artifacts live
/// outside the store and are referenced by path through checkpoints.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Status of a pipeline run.
///
/// Transitions are monotonic and acyclic except for the idempotent
/// `Running → Running` re-entry on resume. A job always passes through
/// `Running` before reaching a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Record exists, pipeline has not started
    Created,
    /// Pipeline run in progress (or interrupted and resumable)
    Running,
    /// Every enabled step completed
    Succeeded,
    /// A step failed permanently or exhausted its retries
    Failed,
    /// Explicitly cancelled by an operator
    Cancelled,
}

impl JobStatus {
    /// Check if this status permits a transition to `next`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Created, Running)
                | (Running, Running)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }

    /// Check if this status is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled)
    }

    /// Parse a status from its display form (for CLI filters).
    pub fn parse(s: &str) -> Option<JobStatus> {
        match s {
            "created" => Some(JobStatus::Created),
            "running" => Some(JobStatus::Running),
            "succeeded" => Some(JobStatus::Succeeded),
            "failed" => Some(JobStatus::Failed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }
}

crate::simple_display! {
    JobStatus {
        Created => "created",
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// Attempted status transition the state machine forbids.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid job status transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// One pipeline run for one unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Which pipeline configuration produced this job
    pub kind: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Present only when `status == Failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    /// Optimistic-concurrency counter, bumped by the store on every write.
    /// A stale version on write is a conflict, never last-writer-wins.
    #[serde(default)]
    pub version: u64,
}

impl Job {
    /// Create a new job record in `Created` status.
    pub fn new(kind: impl Into<String>, metadata: Metadata, clock: &impl Clock) -> Self {
        let now = clock.now_utc();
        Self {
            id: JobId::new(),
            kind: kind.into(),
            status: JobStatus::Created,
            created_at: now,
            updated_at: now,
            error: None,
            metadata,
            version: 0,
        }
    }

    /// Apply a status transition, stamping `updated_at` unconditionally.
    ///
    /// `error` is stored only for `Failed`; any other target clears a stale
    /// error from a previous attempt. Rejects transitions the state machine
    /// forbids; this is the single mutation path for `status`.
    pub fn apply_status(
        &mut self,
        next: JobStatus,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition { from: self.status, to: next });
        }
        self.status = next;
        self.error = if next == JobStatus::Failed { error } else { None };
        self.updated_at = now;
        Ok(())
    }

    /// Merge a metadata key, stamping `updated_at`.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value, now: DateTime<Utc>) {
        self.metadata.insert(key.into(), value);
        self.updated_at = now;
    }
}

crate::builder! {
    pub struct JobBuilder => Job {
        into {
            id: JobId = "job-test0000000000000000",
            kind: String = "story",
        }
        set {
            status: JobStatus = JobStatus::Created,
            metadata: Metadata = Metadata::new(),
            version: u64 = 0,
        }
        option {
            error: String = None,
        }
        computed {
            created_at: DateTime<Utc> = Utc::now(),
            updated_at: DateTime<Utc> = Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
