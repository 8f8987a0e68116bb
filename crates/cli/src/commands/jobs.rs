// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sm status`, `sm list`, `sm cancel`, `sm invalidate`.

use crate::output;
use anyhow::{bail, Context};
use sm_bridge::{Bridge, BridgeConfig};
use sm_core::{JobId, JobStatus, SystemClock};
use sm_engine::{Orchestrator, PipelineSpec};
use sm_store::{CheckpointStore, JobStore};
use std::path::Path;
use std::sync::Arc;

pub fn status(data_dir: &Path, job_id: &str) -> anyhow::Result<i32> {
    let store = super::open_store(data_dir)?;
    let id = JobId::from_string(job_id);
    let job = store.get(&id)?;
    let checkpoints = store.list_for(&id)?;
    output::print_job(&job, &checkpoints);
    Ok(0)
}

pub fn list(data_dir: &Path, status: Option<&str>) -> anyhow::Result<i32> {
    let store = super::open_store(data_dir)?;
    let jobs = match status {
        Some(text) => {
            let status = JobStatus::parse(text)
                .with_context(|| format!("unknown status {text:?}"))?;
            store.list_by_status(status)?
        }
        None => store.list()?,
    };
    output::print_job_table(&jobs);
    Ok(0)
}

pub fn cancel(data_dir: &Path, job_id: &str) -> anyhow::Result<i32> {
    let store = Arc::new(super::open_store(data_dir)?);
    let orchestrator = Orchestrator::new(
        store.clone() as Arc<dyn JobStore>,
        store as Arc<dyn CheckpointStore>,
        Arc::new(Bridge::new(BridgeConfig::default())),
        SystemClock,
    );
    let job = orchestrator.cancel(&JobId::from_string(job_id))?;
    println!("{} cancelled", job.id);
    Ok(0)
}

pub fn invalidate(
    data_dir: &Path,
    pipeline_path: &Path,
    job_id: &str,
    step: &str,
) -> anyhow::Result<i32> {
    let pipeline = PipelineSpec::load(pipeline_path)?;
    let store = super::open_store(data_dir)?;
    let id = JobId::from_string(job_id);

    // Invalidation targets resumable jobs; a finished job's artifacts are
    // regenerated under a fresh job instead
    let job = store.get(&id)?;
    if job.status.is_terminal() {
        bail!("job {id} is {}; create a new run instead of invalidating", job.status);
    }

    let removed = store.invalidate_from(&id, step, &pipeline.step_order())?;
    if removed.is_empty() {
        println!("no checkpoints to remove from {step}");
    } else {
        println!("removed checkpoints: {}", removed.join(", "));
    }
    Ok(0)
}
