// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

const STORY_PIPELINE: &str = r#"
kind = "story-video"
call_timeout_ms = 120000

[retry]
max_attempts = 4
initial_delay_ms = 100

[[steps]]
name = "generate_script"
channel = "text"
operation = "generate_text"

[[steps]]
name = "synthesize_narration"
channel = "speech"
operation = "synthesize_speech"

[[steps]]
name = "render_frames"
enabled = false
channel = "video"
operation = "render_frames"

[channels.text]
program = "sm-workerd"

[channels.speech]
program = "sm-workerd"
args = ["--profile", "speech"]
"#;

fn load_story() -> PipelineSpec {
    let spec: PipelineSpec = toml::from_str(STORY_PIPELINE).unwrap();
    spec
}

#[test]
fn toml_pipeline_parses() {
    let spec = load_story();
    assert_eq!(spec.kind, "story-video");
    assert_eq!(spec.steps.len(), 3);
    assert_eq!(spec.retry.max_attempts, 4);
    assert_eq!(spec.call_timeout(), Duration::from_millis(120_000));
    assert_eq!(spec.channels["speech"].args, vec!["--profile", "speech"]);
}

#[test]
fn disabled_step_is_kept_in_order_but_not_enabled() {
    let spec = load_story();
    assert_eq!(
        spec.step_order(),
        vec!["generate_script", "synthesize_narration", "render_frames"]
    );
    let enabled: Vec<_> = spec.enabled_steps().map(|s| s.name.as_str()).collect();
    assert_eq!(enabled, vec!["generate_script", "synthesize_narration"]);
}

#[test]
fn validation_accepts_the_story_pipeline() {
    // `render_frames` references an unconfigured channel but is disabled,
    // which is allowed
    load_story().validate().unwrap();
}

#[parameterized(
    empty_pipeline = { "kind = \"x\"\nsteps = []" },
    bad_step_name  = { "kind = \"x\"\n[[steps]]\nname = \"a/b\"" },
    duplicate_name = { "kind = \"x\"\n[[steps]]\nname = \"a\"\n[[steps]]\nname = \"a\"" },
    missing_channel = { "kind = \"x\"\n[[steps]]\nname = \"a\"\nchannel = \"ghost\"" },
)]
fn validation_rejects(toml_text: &str) {
    let spec: PipelineSpec = toml::from_str(toml_text).unwrap();
    assert!(matches!(spec.validate(), Err(PipelineError::Invalid(_))));
}

#[test]
fn load_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.toml");
    std::fs::write(&path, STORY_PIPELINE).unwrap();
    let spec = PipelineSpec::load(&path).unwrap();
    assert_eq!(spec.kind, "story-video");
}

#[test]
fn load_missing_file_is_io_error() {
    let err = PipelineSpec::load("/nonexistent/pipeline.toml").unwrap_err();
    assert!(matches!(err, PipelineError::Io(_)));
}

#[test]
fn bridge_config_carries_channels() {
    let spec = load_story();
    let config = spec.bridge_config();
    assert_eq!(config.channels.len(), 2);
    assert!(config.channels.contains_key("text"));
}
