// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The stock executor: one step routed through one bridge operation.
//!
//! Every generation stage (text, speech, frames) is an out-of-process
//! worker; this executor is the whole host-side story for such steps. It
//! sends the job's metadata and the upstream output refs as operation
//! args, and expects the worker to answer with an `output_ref`.

use crate::pipeline::PipelineSpec;
use crate::step::{StepContext, StepExecutor, StepFailure, StepOutput, StepResult};
use async_trait::async_trait;
use sm_bridge::Args;
use sm_core::ChannelName;
use std::sync::Arc;

/// A step that delegates its work to a worker operation.
pub struct BridgeStep {
    name: String,
    channel: ChannelName,
    operation: String,
}

impl BridgeStep {
    pub fn new(
        name: impl Into<String>,
        channel: impl Into<ChannelName>,
        operation: impl Into<String>,
    ) -> Self {
        Self { name: name.into(), channel: channel.into(), operation: operation.into() }
    }

    /// Build the executor list for every enabled step of a pipeline that
    /// declares a `channel`/`operation` pair.
    ///
    /// # Errors
    ///
    /// An enabled step without both fields has no executor the engine can
    /// provide; the caller must supply one in code.
    pub fn from_pipeline(
        pipeline: &PipelineSpec,
    ) -> Result<Vec<Arc<dyn StepExecutor>>, crate::pipeline::PipelineError> {
        let mut executors: Vec<Arc<dyn StepExecutor>> = Vec::new();
        for step in pipeline.enabled_steps() {
            match (&step.channel, &step.operation) {
                (Some(channel), Some(operation)) => {
                    executors.push(Arc::new(BridgeStep::new(
                        step.name.clone(),
                        channel.as_str(),
                        operation.clone(),
                    )));
                }
                _ => {
                    return Err(crate::pipeline::PipelineError::Invalid(format!(
                        "step {} has no channel/operation and no in-code executor",
                        step.name
                    )));
                }
            }
        }
        Ok(executors)
    }
}

#[async_trait]
impl StepExecutor for BridgeStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StepContext<'_>) -> StepResult {
        let mut args = Args::new();
        args.insert("job_id".into(), serde_json::json!(ctx.job.id.as_str()));
        args.insert("step".into(), serde_json::json!(self.name));
        args.insert("metadata".into(), serde_json::json!(ctx.job.metadata));
        args.insert("inputs".into(), serde_json::json!(ctx.prior_outputs));

        let data = ctx
            .bridge
            .call_with_cancel(&self.channel, &self.operation, args, ctx.call_timeout, ctx.cancel)
            .await
            .map_err(StepFailure::from)?;

        let output_ref = match &data {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Object(map) => match map.get("output_ref").and_then(|v| v.as_str()) {
                Some(s) => s.to_string(),
                None => {
                    return Err(StepFailure::permanent(format!(
                        "operation {} returned no output_ref",
                        self.operation
                    )))
                }
            },
            _ => {
                return Err(StepFailure::permanent(format!(
                    "operation {} returned unusable data",
                    self.operation
                )))
            }
        };

        let mut output = StepOutput::new(output_ref);
        if let Some(facts) = data.get("facts").and_then(|v| v.as_object()) {
            for (key, value) in facts {
                output = output.fact(key.clone(), value.clone());
            }
        }
        Ok(output)
    }
}

#[cfg(test)]
#[path = "executors_tests.rs"]
mod tests;
