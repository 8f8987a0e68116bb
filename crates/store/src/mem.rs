// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store for tests.
//!
//! Mirrors the [`FsStore`](crate::FsStore) contract (put-once checkpoints,
//! validated status transitions) without touching disk.

use crate::checkpoint_store::{downstream_of, CheckpointStore};
use crate::error::{StoreError, StoreResult};
use crate::job_store::JobStore;
use parking_lot::Mutex;
use sm_core::{Checkpoint, Clock, Job, JobId, JobStatus, Metadata};
use std::collections::BTreeMap;

/// In-memory [`JobStore`] + [`CheckpointStore`].
pub struct MemStore<C: Clock> {
    clock: C,
    jobs: Mutex<BTreeMap<JobId, Job>>,
    checkpoints: Mutex<BTreeMap<(JobId, String), Checkpoint>>,
}

impl<C: Clock> MemStore<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, jobs: Mutex::new(BTreeMap::new()), checkpoints: Mutex::new(BTreeMap::new()) }
    }
}

impl<C: Clock + 'static> JobStore for MemStore<C> {
    fn create(&self, kind: &str, metadata: Metadata) -> StoreResult<Job> {
        let job = Job::new(kind, metadata, &self.clock);
        self.jobs.lock().insert(job.id.clone(), job.clone());
        Ok(job)
    }

    fn get(&self, id: &JobId) -> StoreResult<Job> {
        self.jobs
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::JobNotFound(id.to_string()))
    }

    fn update_status(&self, id: &JobId, next: JobStatus, error: Option<&str>) -> StoreResult<Job> {
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::JobNotFound(id.to_string()))?;
        job.apply_status(next, error.map(String::from), self.clock.now_utc())?;
        job.version += 1;
        Ok(job.clone())
    }

    fn update_metadata(&self, id: &JobId, key: &str, value: serde_json::Value) -> StoreResult<Job> {
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::JobNotFound(id.to_string()))?;
        job.set_metadata(key, value, self.clock.now_utc());
        job.version += 1;
        Ok(job.clone())
    }

    fn list(&self) -> StoreResult<Vec<Job>> {
        Ok(self.jobs.lock().values().cloned().collect())
    }

    fn list_by_status(&self, status: JobStatus) -> StoreResult<Vec<Job>> {
        Ok(self.jobs.lock().values().filter(|j| j.status == status).cloned().collect())
    }
}

impl<C: Clock + 'static> CheckpointStore for MemStore<C> {
    fn has(&self, job: &JobId, step: &str) -> StoreResult<bool> {
        Ok(self.checkpoints.lock().contains_key(&(job.clone(), step.to_string())))
    }

    fn load(&self, job: &JobId, step: &str) -> StoreResult<Checkpoint> {
        self.checkpoints
            .lock()
            .get(&(job.clone(), step.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::CheckpointNotFound {
                job_id: job.to_string(),
                step: step.to_string(),
            })
    }

    fn put(&self, checkpoint: Checkpoint, overwrite: bool) -> StoreResult<()> {
        let key = (checkpoint.job_id.clone(), checkpoint.step_name.clone());
        let mut checkpoints = self.checkpoints.lock();
        if checkpoints.contains_key(&key) && !overwrite {
            return Err(StoreError::AlreadyExists {
                job_id: checkpoint.job_id.to_string(),
                step: checkpoint.step_name,
            });
        }
        checkpoints.insert(key, checkpoint);
        Ok(())
    }

    fn list_for(&self, job: &JobId) -> StoreResult<Vec<Checkpoint>> {
        Ok(self
            .checkpoints
            .lock()
            .iter()
            .filter(|((id, _), _)| id == job)
            .map(|(_, cp)| cp.clone())
            .collect())
    }

    fn invalidate_from(
        &self,
        job: &JobId,
        step: &str,
        ordered_steps: &[String],
    ) -> StoreResult<Vec<String>> {
        let suffix = downstream_of(step, ordered_steps)
            .ok_or_else(|| StoreError::UnknownStep(step.to_string()))?;
        let mut checkpoints = self.checkpoints.lock();
        let mut removed = Vec::new();
        for name in suffix {
            if checkpoints.remove(&(job.clone(), name.clone())).is_some() {
                removed.push(name.clone());
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "mem_tests.rs"]
mod tests;
