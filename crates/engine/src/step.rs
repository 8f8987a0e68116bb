// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The uniform contract every pipeline stage implements.
//!
//! Executors never raise across the orchestrator boundary: failure is a
//! value ([`StepFailure`]) whose kind drives the retry policy.

use async_trait::async_trait;
use sm_bridge::{Bridge, BridgeError};
use sm_core::{Job, Metadata};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Whether the orchestrator may retry a failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Worker timeout, crash mid-call, transient resource trouble
    Retryable,
    /// Invalid input or an operation that cannot succeed; no retry
    Permanent,
}

sm_core::simple_display! {
    FailureKind {
        Retryable => "retryable",
        Permanent => "permanent",
    }
}

/// A step's structured failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} failure: {message}")]
pub struct StepFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl StepFailure {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self { kind: FailureKind::Retryable, message: message.into() }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self { kind: FailureKind::Permanent, message: message.into() }
    }
}

impl From<BridgeError> for StepFailure {
    fn from(e: BridgeError) -> Self {
        let kind = if e.is_retryable() { FailureKind::Retryable } else { FailureKind::Permanent };
        Self { kind, message: e.to_string() }
    }
}

/// A successful step's product.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    /// Opaque reference the next step uses to locate this step's artifact
    pub output_ref: String,
    /// Small facts to merge into the job record's metadata
    pub facts: Metadata,
}

impl StepOutput {
    pub fn new(output_ref: impl Into<String>) -> Self {
        Self { output_ref: output_ref.into(), facts: Metadata::new() }
    }

    pub fn fact(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.facts.insert(key.into(), value);
        self
    }
}

pub type StepResult = Result<StepOutput, StepFailure>;

/// Everything a step may consult, injected by the orchestrator.
///
/// Downstream steps must not assume every upstream step actually ran:
/// `prior_outputs` holds what checkpoints exist, not a log of executions.
pub struct StepContext<'a> {
    pub job: &'a Job,
    /// Step name → output_ref for every checkpointed step so far
    pub prior_outputs: &'a BTreeMap<String, String>,
    pub bridge: &'a Bridge,
    pub cancel: &'a CancellationToken,
    /// Deadline for bridge calls made by this step
    pub call_timeout: Duration,
}

/// One pipeline stage.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Step name; must match the pipeline configuration entry.
    fn name(&self) -> &str;

    /// Do the work. May call the bridge through `ctx`; must return a
    /// structured result rather than panic.
    async fn execute(&self, ctx: &StepContext<'_>) -> StepResult;
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
