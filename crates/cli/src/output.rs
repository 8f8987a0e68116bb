// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain-text rendering for job records and run outcomes.

use sm_core::{Checkpoint, Job, JobId};
use sm_engine::RunOutcome;

pub fn print_outcome(job_id: &JobId, outcome: &RunOutcome) {
    println!("job {job_id}: {}", outcome.status);
    if !outcome.steps_skipped.is_empty() {
        println!("  skipped (checkpointed): {}", outcome.steps_skipped.join(", "));
    }
    if !outcome.steps_run.is_empty() {
        println!("  ran: {}", outcome.steps_run.join(", "));
    }
}

pub fn print_job(job: &Job, checkpoints: &[Checkpoint]) {
    println!("id:      {}", job.id);
    println!("kind:    {}", job.kind);
    println!("status:  {}", job.status);
    println!("created: {}", job.created_at.to_rfc3339());
    println!("updated: {}", job.updated_at.to_rfc3339());
    if let Some(error) = &job.error {
        println!("error:   {error}");
    }
    if !job.metadata.is_empty() {
        println!("metadata:");
        for (key, value) in &job.metadata {
            println!("  {key} = {value}");
        }
    }
    if !checkpoints.is_empty() {
        println!("checkpoints:");
        let mut sorted: Vec<_> = checkpoints.iter().collect();
        sorted.sort_by_key(|cp| cp.completed_at);
        for cp in sorted {
            println!("  {} -> {}", cp.step_name, cp.output_ref);
        }
    }
}

pub fn print_job_table(jobs: &[Job]) {
    if jobs.is_empty() {
        println!("no jobs");
        return;
    }
    let mut sorted: Vec<_> = jobs.iter().collect();
    sorted.sort_by_key(|j| j.created_at);
    for job in sorted {
        println!("{}  {:<9}  {}  {}", job.id, job.status.to_string(), job.kind, job.updated_at.to_rfc3339());
    }
}

#[cfg(test)]
mod tests {
    // Rendering is exercised end-to-end by the workspace spec tests; the
    // only logic here worth pinning is checkpoint ordering.
    use super::*;
    use sm_core::FakeClock;

    #[test]
    fn checkpoints_print_in_completion_order() {
        let clock = FakeClock::new();
        let job_id = JobId::new();
        let second = Checkpoint::new(job_id.clone(), "b", "out/b", &clock);
        clock.advance(std::time::Duration::from_secs(1));
        let later = Checkpoint::new(job_id.clone(), "a", "out/a", &clock);

        let mut sorted = [later, second];
        sorted.sort_by_key(|cp| cp.completed_at);
        assert_eq!(sorted[0].step_name, "b");
    }
}
