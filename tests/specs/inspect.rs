// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store inspection and maintenance commands.

use super::prelude::*;
use serial_test::serial;

const ONE_STEP: &[(&str, &str)] = &[("generate_script", "generate_text")];

#[test]
#[serial]
fn list_shows_jobs_and_filters_by_status() {
    let project = Project::new();
    let pipeline = project.pipeline(ONE_STEP, 2);
    let job_id = run(project.sm().arg("run").arg("--pipeline").arg(&pipeline))
        .passes()
        .first_line();

    run(project.sm().arg("list")).passes().stdout_has(&job_id).stdout_has("succeeded");
    run(project.sm().arg("list").arg("--status").arg("succeeded"))
        .passes()
        .stdout_has(&job_id);
    run(project.sm().arg("list").arg("--status").arg("failed"))
        .passes()
        .stdout_has("no jobs");
}

#[test]
#[serial]
fn list_rejects_unknown_status() {
    let project = Project::new();
    let pipeline = project.pipeline(ONE_STEP, 2);
    run(project.sm().arg("run").arg("--pipeline").arg(&pipeline)).passes();

    run(project.sm().arg("list").arg("--status").arg("bogus"))
        .fails_with(1)
        .stderr_has("unknown status");
}

#[test]
#[serial]
fn status_of_a_missing_job_fails() {
    let project = Project::new();
    // Opening the store also creates it, so seed it first
    let pipeline = project.pipeline(ONE_STEP, 2);
    run(project.sm().arg("run").arg("--pipeline").arg(&pipeline)).passes();

    run(project.sm().arg("status").arg("job-does-not-exist"))
        .fails_with(1)
        .stderr_has("job not found");
}

#[test]
#[serial]
fn invalidate_refuses_terminal_jobs() {
    let project = Project::new();
    let pipeline = project.pipeline(ONE_STEP, 2);
    let job_id = run(project.sm().arg("run").arg("--pipeline").arg(&pipeline))
        .passes()
        .first_line();

    run(project
        .sm()
        .arg("invalidate")
        .arg(&job_id)
        .arg("generate_script")
        .arg("--pipeline")
        .arg(&pipeline))
    .fails_with(1)
    .stderr_has("create a new run");
}
