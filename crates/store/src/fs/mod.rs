// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem store backend.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/.lock                      exclusive fs2 lock, one process at a time
//! <root>/jobs/<job-id>.json         one record per job
//! <root>/checkpoints/<job-id>/<step>.json
//! ```
//!
//! Job writes are read-modify-write under a per-job mutex, committed with a
//! compare-and-swap on the record's `version`: a concurrent out-of-band
//! mutation surfaces as `Conflict`, never as a silently lost update.

mod io;

use crate::checkpoint_store::{downstream_of, CheckpointStore};
use crate::error::{StoreError, StoreResult};
use crate::job_store::JobStore;
use fs2::FileExt;
use parking_lot::Mutex;
use sm_core::{Checkpoint, Clock, Job, JobId, JobStatus, Metadata};
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Filesystem-backed [`JobStore`] and [`CheckpointStore`].
pub struct FsStore<C: Clock> {
    root: PathBuf,
    clock: C,
    /// Held for the store's lifetime; releases on drop.
    _lock: File,
    /// Per-job writer mutexes, created lazily.
    job_locks: Mutex<HashMap<JobId, Arc<Mutex<()>>>>,
}

impl<C: Clock> FsStore<C> {
    /// Open a store rooted at `root`, creating the directory layout and
    /// taking the exclusive store lock.
    ///
    /// # Errors
    ///
    /// `Locked` when another process holds the store open.
    pub fn open(root: impl Into<PathBuf>, clock: C) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("jobs"))?;
        fs::create_dir_all(root.join("checkpoints"))?;

        let lock = File::create(root.join(".lock"))?;
        if lock.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked(root.display().to_string()));
        }

        debug!(root = %root.display(), "store opened");
        Ok(Self { root, clock, _lock: lock, job_locks: Mutex::new(HashMap::new()) })
    }

    fn job_path(&self, id: &JobId) -> PathBuf {
        self.root.join("jobs").join(format!("{}.json", id.as_str()))
    }

    fn checkpoint_dir(&self, job: &JobId) -> PathBuf {
        self.root.join("checkpoints").join(job.as_str())
    }

    fn checkpoint_path(&self, job: &JobId, step: &str) -> PathBuf {
        self.checkpoint_dir(job).join(format!("{step}.json"))
    }

    fn lock_for(&self, id: &JobId) -> Arc<Mutex<()>> {
        let mut locks = self.job_locks.lock();
        Arc::clone(locks.entry(id.clone()).or_default())
    }

    fn load_job(&self, id: &JobId) -> StoreResult<Job> {
        match io::read_json(&self.job_path(id)) {
            Ok(job) => Ok(job),
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::JobNotFound(id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Commit a mutated job record, verifying the on-disk version still
    /// matches the generation the mutation was based on.
    fn commit_job(&self, mut job: Job, expected_version: u64) -> StoreResult<Job> {
        let current = self.load_job(&job.id)?;
        if current.version != expected_version {
            return Err(StoreError::Conflict {
                job_id: job.id.to_string(),
                expected: expected_version,
                found: current.version,
            });
        }
        job.version = expected_version + 1;
        io::atomic_replace_json(&self.job_path(&job.id), &job)?;
        Ok(job)
    }

    /// Read-modify-write one job record under its writer mutex.
    fn with_job(&self, id: &JobId, mutate: impl FnOnce(&mut Job) -> StoreResult<()>) -> StoreResult<Job> {
        let lock = self.lock_for(id);
        let _guard = lock.lock();
        let mut job = self.load_job(id)?;
        let expected = job.version;
        mutate(&mut job)?;
        self.commit_job(job, expected)
    }
}

impl<C: Clock + 'static> JobStore for FsStore<C> {
    fn create(&self, kind: &str, metadata: Metadata) -> StoreResult<Job> {
        let job = Job::new(kind, metadata, &self.clock);
        io::atomic_write_json(&self.job_path(&job.id), &job)?;
        debug!(job_id = %job.id, kind, "job created");
        Ok(job)
    }

    fn get(&self, id: &JobId) -> StoreResult<Job> {
        self.load_job(id)
    }

    fn update_status(&self, id: &JobId, next: JobStatus, error: Option<&str>) -> StoreResult<Job> {
        let updated = self.with_job(id, |job| {
            job.apply_status(next, error.map(String::from), self.clock.now_utc())?;
            Ok(())
        })?;
        debug!(job_id = %id, status = %next, "job status updated");
        Ok(updated)
    }

    fn update_metadata(&self, id: &JobId, key: &str, value: serde_json::Value) -> StoreResult<Job> {
        self.with_job(id, |job| {
            job.set_metadata(key, value.clone(), self.clock.now_utc());
            Ok(())
        })
    }

    fn list(&self) -> StoreResult<Vec<Job>> {
        let mut jobs = Vec::new();
        for entry in fs::read_dir(self.root.join("jobs"))? {
            let path = entry?.path();
            if io::is_record(&path) {
                jobs.push(io::read_json(&path)?);
            }
        }
        Ok(jobs)
    }

    fn list_by_status(&self, status: JobStatus) -> StoreResult<Vec<Job>> {
        Ok(self.list()?.into_iter().filter(|j: &Job| j.status == status).collect())
    }
}

impl<C: Clock + 'static> CheckpointStore for FsStore<C> {
    fn has(&self, job: &JobId, step: &str) -> StoreResult<bool> {
        validate_step_name(step)?;
        Ok(self.checkpoint_path(job, step).exists())
    }

    fn load(&self, job: &JobId, step: &str) -> StoreResult<Checkpoint> {
        validate_step_name(step)?;
        match io::read_json(&self.checkpoint_path(job, step)) {
            Ok(cp) => Ok(cp),
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::CheckpointNotFound { job_id: job.to_string(), step: step.into() })
            }
            Err(e) => Err(e),
        }
    }

    fn put(&self, checkpoint: Checkpoint, overwrite: bool) -> StoreResult<()> {
        validate_step_name(&checkpoint.step_name)?;
        let lock = self.lock_for(&checkpoint.job_id);
        let _guard = lock.lock();

        let path = self.checkpoint_path(&checkpoint.job_id, &checkpoint.step_name);
        if path.exists() && !overwrite {
            return Err(StoreError::AlreadyExists {
                job_id: checkpoint.job_id.to_string(),
                step: checkpoint.step_name,
            });
        }
        fs::create_dir_all(self.checkpoint_dir(&checkpoint.job_id))?;
        io::atomic_write_json(&path, &checkpoint)?;
        debug!(job_id = %checkpoint.job_id, step = %checkpoint.step_name, "checkpoint written");
        Ok(())
    }

    fn list_for(&self, job: &JobId) -> StoreResult<Vec<Checkpoint>> {
        let dir = self.checkpoint_dir(job);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut checkpoints = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if io::is_record(&path) {
                checkpoints.push(io::read_json(&path)?);
            }
        }
        Ok(checkpoints)
    }

    fn invalidate_from(
        &self,
        job: &JobId,
        step: &str,
        ordered_steps: &[String],
    ) -> StoreResult<Vec<String>> {
        validate_step_name(step)?;
        let suffix = downstream_of(step, ordered_steps)
            .ok_or_else(|| StoreError::UnknownStep(step.to_string()))?;

        let lock = self.lock_for(job);
        let _guard = lock.lock();

        let mut removed = Vec::new();
        for name in suffix {
            let path = self.checkpoint_path(job, name);
            if path.exists() {
                fs::remove_file(&path)?;
                removed.push(name.clone());
            }
        }
        debug!(job_id = %job, step, removed = removed.len(), "checkpoints invalidated");
        Ok(removed)
    }
}

/// Step names become file names; reject anything that could escape the
/// checkpoint directory.
fn validate_step_name(step: &str) -> StoreResult<()> {
    let ok = !step.is_empty()
        && step.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidStepName(step.to_string()))
    }
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
