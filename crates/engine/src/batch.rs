// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch driver: N jobs, each with its own orchestrator pass, bounded by a
//! worker-pool-sized semaphore so constrained channels are not
//! oversubscribed. Steps inside one job stay strictly sequential; the
//! parallelism is across jobs only.

use crate::error::EngineError;
use crate::orchestrator::{Orchestrator, RunOutcome};
use crate::pipeline::PipelineSpec;
use crate::step::StepExecutor;
use sm_core::{Clock, JobId};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Result of one job's run within a batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub job_id: JobId,
    pub result: Result<RunOutcome, EngineError>,
}

/// Run every job through the pipeline, at most `concurrency` at a time.
///
/// Outcomes are returned in completion order. The cancellation token fans
/// out to every run: raising it stops new steps everywhere and leaves
/// unfinished jobs `Running` for resume.
pub async fn run_batch<C: Clock + 'static>(
    orchestrator: Arc<Orchestrator<C>>,
    pipeline: Arc<PipelineSpec>,
    executors: Arc<Vec<Arc<dyn StepExecutor>>>,
    job_ids: Vec<JobId>,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Vec<BatchOutcome> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for job_id in job_ids {
        let orchestrator = Arc::clone(&orchestrator);
        let pipeline = Arc::clone(&pipeline);
        let executors = Arc::clone(&executors);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        tasks.spawn(async move {
            // Closed semaphore is unreachable; treat it as cancellation
            let Ok(_permit) = semaphore.acquire().await else {
                return BatchOutcome {
                    job_id,
                    result: Ok(RunOutcome {
                        status: sm_core::JobStatus::Running,
                        steps_run: Vec::new(),
                        steps_skipped: Vec::new(),
                    }),
                };
            };
            let result = orchestrator.run(&job_id, &pipeline, &executors, &cancel).await;
            BatchOutcome { job_id, result }
        });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => warn!(error = %e, "batch task aborted"),
        }
    }
    outcomes
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
