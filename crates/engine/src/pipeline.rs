// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline configuration: a fixed, ordered list of steps with skip flags.
//!
//! Not a DAG: the sequence is linear by design, and resume is purely a
//! function of which checkpoints exist for it.

use serde::Deserialize;
use sm_bridge::{BridgeConfig, WorkerCommand};
use sm_core::RetryPolicy;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("io error reading pipeline file: {0}")]
    Io(#[from] std::io::Error),

    #[error("pipeline parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid pipeline: {0}")]
    Invalid(String),
}

/// One configured step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StepSpec {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Bridge channel for the stock bridge executor; in-process executors
    /// leave this unset
    #[serde(default)]
    pub channel: Option<String>,
    /// Worker operation for the stock bridge executor
    #[serde(default)]
    pub operation: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl StepSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), enabled: true, channel: None, operation: None }
    }

    pub fn disabled(name: impl Into<String>) -> Self {
        Self { enabled: false, ..Self::new(name) }
    }
}

/// A pipeline configuration, loadable from TOML.
///
/// ```toml
/// kind = "story-video"
/// call_timeout_ms = 600000
///
/// [[steps]]
/// name = "generate_script"
/// channel = "text"
/// operation = "generate_text"
///
/// [channels.text]
/// program = "sm-workerd"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSpec {
    /// Tag stamped on every job this pipeline produces
    pub kind: String,
    pub steps: Vec<StepSpec>,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Deadline for each bridge call a step makes
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Worker command per bridge channel
    #[serde(default)]
    pub channels: HashMap<String, WorkerCommand>,
}

fn default_call_timeout_ms() -> u64 {
    300_000
}

impl PipelineSpec {
    /// Build a pipeline in code (tests, embedded pipelines).
    pub fn new(kind: impl Into<String>, steps: Vec<StepSpec>) -> Self {
        Self {
            kind: kind.into(),
            steps,
            retry: RetryPolicy::default(),
            call_timeout_ms: default_call_timeout_ms(),
            channels: HashMap::new(),
        }
    }

    /// Load and validate a pipeline from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path)?;
        let spec: PipelineSpec = toml::from_str(&text)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Step names must be unique and usable as checkpoint file names.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.steps.is_empty() {
            return Err(PipelineError::Invalid("pipeline has no steps".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for step in &self.steps {
            let name_ok = !step.name.is_empty()
                && step.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            if !name_ok {
                return Err(PipelineError::Invalid(format!("bad step name: {:?}", step.name)));
            }
            if !seen.insert(step.name.as_str()) {
                return Err(PipelineError::Invalid(format!("duplicate step name: {}", step.name)));
            }
            if let Some(channel) = &step.channel {
                if step.enabled && !self.channels.contains_key(channel) {
                    return Err(PipelineError::Invalid(format!(
                        "step {} references unknown channel {channel}",
                        step.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Configured order of *all* steps, enabled or not. Checkpoint
    /// invalidation works on this order so a disabled step's position
    /// still anchors its downstream.
    pub fn step_order(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name.clone()).collect()
    }

    pub fn enabled_steps(&self) -> impl Iterator<Item = &StepSpec> {
        self.steps.iter().filter(|s| s.enabled)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Bridge configuration for this pipeline's channels.
    pub fn bridge_config(&self) -> BridgeConfig {
        let mut config = BridgeConfig::default();
        for (name, command) in &self.channels {
            config = config.with_channel(name.as_str(), command.clone());
        }
        config
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
