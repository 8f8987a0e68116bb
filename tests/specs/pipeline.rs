// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Full pipeline runs through the real binaries.

use super::prelude::*;
use serial_test::serial;

const STORY_STEPS: &[(&str, &str)] = &[
    ("generate_script", "generate_text"),
    ("synthesize_narration", "synthesize_speech"),
    ("render_frames", "render_frames"),
];

#[test]
#[serial]
fn run_drives_a_three_stage_pipeline_to_success() {
    let project = Project::new();
    let pipeline = project.pipeline(STORY_STEPS, 2);

    let result = run(project
        .sm()
        .arg("run")
        .arg("--pipeline")
        .arg(&pipeline)
        .arg("--meta")
        .arg("title=The Lighthouse"))
    .passes()
    .stdout_has("succeeded")
    .stdout_has("ran: generate_script, synthesize_narration, render_frames");
    let job_id = result.first_line();
    assert!(job_id.starts_with("job-"), "{job_id}");

    run(project.sm().arg("status").arg(&job_id))
        .passes()
        .stdout_has("status:  succeeded")
        .stdout_has("generate_script ->")
        .stdout_has("render_frames ->")
        .stdout_has("title = \"The Lighthouse\"");

    // Worker artifacts landed under the out dir
    let script = project.out_dir().join(&job_id).join("generate_script.json");
    assert!(script.exists(), "missing {}", script.display());
}

#[test]
#[serial]
fn resume_of_a_finished_job_does_no_work() {
    let project = Project::new();
    let pipeline = project.pipeline(STORY_STEPS, 2);
    let job_id = run(project.sm().arg("run").arg("--pipeline").arg(&pipeline))
        .passes()
        .first_line();

    run(project.sm().arg("resume").arg(&job_id).arg("--pipeline").arg(&pipeline))
        .passes()
        .stdout_has("succeeded")
        .stdout_lacks("ran:");
}

#[test]
#[serial]
fn retryable_worker_failure_is_retried_to_success() {
    let project = Project::new();
    let pipeline = project.pipeline(&[("flaky", "flaky_once")], 3);

    let job_id = run(project.sm().arg("run").arg("--pipeline").arg(&pipeline))
        .passes()
        .stdout_has("succeeded")
        .first_line();

    run(project.sm().arg("status").arg(&job_id))
        .passes()
        .stdout_has("flaky ->");
}

#[test]
#[serial]
fn permanent_worker_failure_fails_the_job_and_keeps_upstream_checkpoints() {
    let project = Project::new();
    let pipeline = project.pipeline(
        &[("generate_script", "generate_text"), ("doomed", "always_fail")],
        2,
    );

    let job_id = run(project.sm().arg("run").arg("--pipeline").arg(&pipeline))
        .fails_with(1)
        .stdout_has("failed")
        .first_line();

    run(project.sm().arg("status").arg(&job_id))
        .passes()
        .stdout_has("status:  failed")
        .stdout_has("error:")
        .stdout_has("Unsatisfiable")
        .stdout_has("generate_script ->")
        .stdout_lacks("doomed ->");
}

#[test]
#[serial]
fn unknown_operation_is_a_permanent_failure() {
    let project = Project::new();
    let pipeline = project.pipeline(&[("mystery", "transmogrify")], 3);

    run(project.sm().arg("run").arg("--pipeline").arg(&pipeline))
        .fails_with(1)
        .stdout_has("failed");
}
