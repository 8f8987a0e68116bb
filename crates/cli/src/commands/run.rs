// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sm run` and `sm resume`.

use crate::output;
use anyhow::Context;
use sm_bridge::Bridge;
use sm_core::{JobId, JobStatus, Metadata, SystemClock};
use sm_engine::{BridgeStep, Orchestrator, PipelineSpec, RunOutcome};
use sm_store::{CheckpointStore, JobStore};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Parse `--meta key=value` pairs. Values that parse as JSON scalars are
/// stored typed; everything else is a string.
pub(crate) fn parse_meta(pairs: &[String]) -> anyhow::Result<Metadata> {
    let mut metadata = Metadata::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("--meta needs key=value, got {pair:?}"))?;
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        metadata.insert(key.to_string(), value);
    }
    Ok(metadata)
}

pub async fn fresh(data_dir: &Path, pipeline_path: &Path, meta: &[String]) -> anyhow::Result<i32> {
    let metadata = parse_meta(meta)?;
    let pipeline = PipelineSpec::load(pipeline_path)?;
    let session = Session::open(data_dir, pipeline)?;

    let job = session.orchestrator.create_job(&session.pipeline, metadata)?;
    println!("{}", job.id);
    session.drive(&job.id).await
}

pub async fn resume(data_dir: &Path, pipeline_path: &Path, job_id: &str) -> anyhow::Result<i32> {
    let pipeline = PipelineSpec::load(pipeline_path)?;
    let session = Session::open(data_dir, pipeline)?;
    session.drive(&JobId::from_string(job_id)).await
}

/// One store + bridge + orchestrator wired for a pipeline file.
struct Session {
    pipeline: PipelineSpec,
    bridge: Arc<Bridge>,
    orchestrator: Orchestrator<SystemClock>,
}

impl Session {
    fn open(data_dir: &Path, pipeline: PipelineSpec) -> anyhow::Result<Self> {
        let store = Arc::new(super::open_store(data_dir)?);
        let bridge = Arc::new(Bridge::new(pipeline.bridge_config()));
        let orchestrator = Orchestrator::new(
            store.clone() as Arc<dyn JobStore>,
            store as Arc<dyn CheckpointStore>,
            Arc::clone(&bridge),
            SystemClock,
        );
        Ok(Self { pipeline, bridge, orchestrator })
    }

    /// Run the job, wiring Ctrl-C to cooperative cancellation (which
    /// leaves the job resumable rather than cancelled).
    async fn drive(&self, job_id: &JobId) -> anyhow::Result<i32> {
        let executors = BridgeStep::from_pipeline(&self.pipeline)?;
        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, stopping after the current step");
                interrupt.cancel();
            }
        });

        let outcome = self.orchestrator.run(job_id, &self.pipeline, &executors, &cancel).await;
        self.bridge.shutdown().await;

        let outcome: RunOutcome = outcome?;
        output::print_outcome(job_id, &outcome);
        Ok(match outcome.status {
            JobStatus::Succeeded => 0,
            JobStatus::Failed => 1,
            // Interrupted mid-run: resumable, not an error
            _ => 0,
        })
    }
}
