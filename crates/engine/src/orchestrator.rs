// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The orchestrator run loop.
//!
//! For each enabled step in configured order: checkpoint present means the
//! step is done (no executor call, no bridge traffic); otherwise execute
//! with bounded retries, checkpoint on success, fail the job on a permanent
//! or retry-exhausted failure. A raised cancellation token stops new work
//! and leaves the job `Running` for a later resume; only an explicit
//! [`Orchestrator::cancel`] produces `Cancelled`.

use crate::error::EngineError;
use crate::pipeline::PipelineSpec;
use crate::step::{FailureKind, StepContext, StepExecutor, StepFailure};
use sm_bridge::Bridge;
use sm_core::{Checkpoint, Clock, Job, JobId, JobStatus, Metadata};
use sm_store::{CheckpointStore, JobStore, StoreResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fixed retry budget for the store itself (distinct from step retries).
const STORE_RETRIES: u32 = 3;
const STORE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// What one `run` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: JobStatus,
    /// Steps whose executor actually ran this time
    pub steps_run: Vec<String>,
    /// Steps skipped because a checkpoint already existed
    pub steps_skipped: Vec<String>,
}

/// Composes the step executors over one job and drives its state machine.
pub struct Orchestrator<C: Clock> {
    jobs: Arc<dyn JobStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    bridge: Arc<Bridge>,
    clock: C,
}

impl<C: Clock> Orchestrator<C> {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        bridge: Arc<Bridge>,
        clock: C,
    ) -> Self {
        Self { jobs, checkpoints, bridge, clock }
    }

    /// Create a fresh job for this pipeline.
    pub fn create_job(&self, pipeline: &PipelineSpec, metadata: Metadata) -> Result<Job, EngineError> {
        Ok(self.jobs.create(&pipeline.kind, metadata)?)
    }

    /// Run (or resume) a job through the pipeline.
    ///
    /// Returns `Ok` with the job's resulting status for step-level
    /// outcomes; `Err` only for fatal conditions (store unavailable,
    /// unusable configuration), which deliberately leave the job status
    /// untouched.
    pub async fn run(
        &self,
        job_id: &JobId,
        pipeline: &PipelineSpec,
        executors: &[Arc<dyn StepExecutor>],
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, EngineError> {
        let job = self.store_retry(|| self.jobs.get(job_id)).await?;
        if job.status.is_terminal() {
            // Nothing to do; a finished job resumes to the same answer
            debug!(job_id = %job_id, status = %job.status, "job already terminal");
            return Ok(RunOutcome {
                status: job.status,
                steps_run: Vec::new(),
                steps_skipped: Vec::new(),
            });
        }

        // Created -> Running, or the idempotent Running -> Running on resume
        let mut job = self
            .store_retry(|| self.jobs.update_status(job_id, JobStatus::Running, None))
            .await?;
        info!(job_id = %job_id, kind = %pipeline.kind, "pipeline run started");

        let mut outcome = RunOutcome {
            status: JobStatus::Running,
            steps_run: Vec::new(),
            steps_skipped: Vec::new(),
        };
        let mut prior_outputs: BTreeMap<String, String> = BTreeMap::new();

        for spec in pipeline.enabled_steps() {
            if cancel.is_cancelled() {
                info!(job_id = %job_id, "cancellation requested, leaving job resumable");
                return Ok(outcome);
            }

            if self.store_retry(|| self.checkpoints.has(job_id, &spec.name)).await? {
                let checkpoint = self.store_retry(|| self.checkpoints.load(job_id, &spec.name)).await?;
                debug!(job_id = %job_id, step = %spec.name, "checkpoint present, skipping");
                prior_outputs.insert(spec.name.clone(), checkpoint.output_ref);
                outcome.steps_skipped.push(spec.name.clone());
                continue;
            }

            let executor = executors
                .iter()
                .find(|e| e.name() == spec.name)
                .ok_or_else(|| EngineError::Config(format!("no executor for step {}", spec.name)))?;

            match self
                .execute_with_retries(&job, executor.as_ref(), &prior_outputs, pipeline, cancel)
                .await
            {
                Ok(output) => {
                    let checkpoint = Checkpoint::new(
                        job_id.clone(),
                        spec.name.clone(),
                        output.output_ref.clone(),
                        &self.clock,
                    );
                    self.store_retry(|| self.checkpoints.put(checkpoint.clone(), false)).await?;
                    for (key, value) in &output.facts {
                        job = self
                            .store_retry(|| self.jobs.update_metadata(job_id, key, value.clone()))
                            .await?;
                    }
                    prior_outputs.insert(spec.name.clone(), output.output_ref);
                    outcome.steps_run.push(spec.name.clone());
                    info!(job_id = %job_id, step = %spec.name, "step completed");
                }
                Err(Interrupted::Cancelled) => {
                    info!(job_id = %job_id, step = %spec.name, "step cancelled, leaving job resumable");
                    return Ok(outcome);
                }
                Err(Interrupted::Failed(failure)) => {
                    let message = format!("step {} failed: {}", spec.name, failure.message);
                    warn!(job_id = %job_id, step = %spec.name, error = %failure, "job failed");
                    self.store_retry(|| {
                        self.jobs.update_status(job_id, JobStatus::Failed, Some(&message))
                    })
                    .await?;
                    outcome.status = JobStatus::Failed;
                    return Ok(outcome);
                }
            }
        }

        self.store_retry(|| self.jobs.update_status(job_id, JobStatus::Succeeded, None)).await?;
        info!(job_id = %job_id, "pipeline run succeeded");
        outcome.status = JobStatus::Succeeded;
        Ok(outcome)
    }

    /// Explicitly cancel a job. The only path to `Cancelled`.
    ///
    /// A `Created` job is walked through `Running` first: the state
    /// machine does not let a job skip `Running` on the way to a terminal
    /// state.
    pub fn cancel(&self, job_id: &JobId) -> Result<Job, EngineError> {
        let job = self.jobs.get(job_id)?;
        if job.status == JobStatus::Created {
            self.jobs.update_status(job_id, JobStatus::Running, None)?;
        }
        Ok(self.jobs.update_status(job_id, JobStatus::Cancelled, None)?)
    }

    /// Force-regenerate a step: drop its checkpoint and every checkpoint
    /// downstream of it. Returns the step names whose checkpoints were
    /// removed. The next `run` re-executes from there.
    pub fn force_rerun(
        &self,
        job_id: &JobId,
        step: &str,
        pipeline: &PipelineSpec,
    ) -> Result<Vec<String>, EngineError> {
        Ok(self.checkpoints.invalidate_from(job_id, step, &pipeline.step_order())?)
    }

    /// One step with the pipeline's bounded-retry policy. Only failures the
    /// executor marks retryable consume the budget; a permanent failure
    /// aborts immediately.
    async fn execute_with_retries(
        &self,
        job: &Job,
        executor: &dyn StepExecutor,
        prior_outputs: &BTreeMap<String, String>,
        pipeline: &PipelineSpec,
        cancel: &CancellationToken,
    ) -> Result<crate::step::StepOutput, Interrupted> {
        let ctx = StepContext {
            job,
            prior_outputs,
            bridge: &self.bridge,
            cancel,
            call_timeout: pipeline.call_timeout(),
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            debug!(job_id = %job.id, step = %executor.name(), attempt, "executing step");
            let failure = match executor.execute(&ctx).await {
                Ok(output) => return Ok(output),
                Err(failure) => failure,
            };

            // A failure caused by our own cancellation is an interruption,
            // not a job failure
            if cancel.is_cancelled() {
                return Err(Interrupted::Cancelled);
            }

            if failure.kind == FailureKind::Permanent {
                return Err(Interrupted::Failed(failure));
            }
            let Some(delay) = pipeline.retry.delay_after(attempt) else {
                warn!(step = %executor.name(), attempts = attempt, "retry budget exhausted");
                return Err(Interrupted::Failed(failure));
            };
            warn!(
                step = %executor.name(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "retryable step failure, backing off"
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(Interrupted::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Run a store operation with the store's own small retry budget.
    /// Exhaustion is fatal to the run and never becomes a job outcome.
    async fn store_retry<T>(&self, op: impl Fn() -> StoreResult<T>) -> Result<T, EngineError> {
        let mut attempt = 0u32;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < STORE_RETRIES => {
                    attempt += 1;
                    warn!(error = %e, attempt, "store operation failed, retrying");
                    tokio::time::sleep(STORE_RETRY_DELAY * attempt).await;
                }
                Err(e) => return Err(EngineError::Store(e)),
            }
        }
    }
}

/// Why a step did not produce output.
enum Interrupted {
    Cancelled,
    Failed(StepFailure),
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
