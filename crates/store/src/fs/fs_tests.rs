// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sm_core::FakeClock;
use std::time::Duration;
use tempfile::tempdir;

fn open_store(dir: &Path) -> FsStore<FakeClock> {
    FsStore::open(dir, FakeClock::new()).expect("open store")
}

fn steps(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn open_creates_layout_and_lock() {
    let dir = tempdir().unwrap();
    let _store = open_store(dir.path());
    assert!(dir.path().join("jobs").is_dir());
    assert!(dir.path().join("checkpoints").is_dir());
    assert!(dir.path().join(".lock").exists());
}

#[test]
fn second_open_fails_while_locked() {
    let dir = tempdir().unwrap();
    let _store = open_store(dir.path());
    let err = FsStore::open(dir.path(), FakeClock::new()).err().expect("should be locked");
    assert!(matches!(err, StoreError::Locked(_)));
}

#[test]
fn lock_releases_on_drop() {
    let dir = tempdir().unwrap();
    {
        let _store = open_store(dir.path());
    }
    let _reopened = open_store(dir.path());
}

#[test]
fn create_then_get_round_trips() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let job = store.create("story", Metadata::new()).unwrap();
    let loaded = store.get(&job.id).unwrap();
    assert_eq!(job, loaded);
}

#[test]
fn get_missing_job_is_not_found() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let err = store.get(&JobId::from_string("job-missing")).unwrap_err();
    assert!(matches!(err, StoreError::JobNotFound(_)));
}

#[test]
fn update_status_bumps_version_and_timestamp() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    let store = FsStore::open(dir.path(), clock.clone()).unwrap();
    let job = store.create("story", Metadata::new()).unwrap();

    clock.advance(Duration::from_secs(3));
    let updated = store.update_status(&job.id, JobStatus::Running, None).unwrap();

    assert_eq!(updated.status, JobStatus::Running);
    assert_eq!(updated.version, job.version + 1);
    assert!(updated.updated_at > job.updated_at);
}

#[test]
fn invalid_transition_is_rejected_and_record_unchanged() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let job = store.create("story", Metadata::new()).unwrap();

    let err = store.update_status(&job.id, JobStatus::Succeeded, None).unwrap_err();
    assert!(matches!(err, StoreError::InvalidTransition(_)));
    assert_eq!(store.get(&job.id).unwrap(), job);
}

#[test]
fn error_message_stored_only_for_failed() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let job = store.create("story", Metadata::new()).unwrap();
    store.update_status(&job.id, JobStatus::Running, None).unwrap();
    let failed = store
        .update_status(&job.id, JobStatus::Failed, Some("render worker timed out"))
        .unwrap();
    assert_eq!(failed.error.as_deref(), Some("render worker timed out"));
}

#[test]
fn stale_version_commit_is_a_conflict() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let job = store.create("story", Metadata::new()).unwrap();
    let mut running = store.update_status(&job.id, JobStatus::Running, None).unwrap();

    // A writer holding the pre-update generation must be rejected.
    running.metadata.insert("stale".into(), serde_json::json!(true));
    let err = store.commit_job(running, job.version).unwrap_err();
    assert!(matches!(err, StoreError::Conflict { expected: 0, found: 1, .. }));
}

#[test]
fn replaced_record_keeps_previous_generation_as_bak() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let job = store.create("story", Metadata::new()).unwrap();
    store.update_status(&job.id, JobStatus::Running, None).unwrap();

    let bak = io::bak_path(&store.job_path(&job.id));
    let previous: Job = io::read_json(&bak).unwrap();
    assert_eq!(previous.status, JobStatus::Created);
}

#[test]
fn list_by_status_filters() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let a = store.create("story", Metadata::new()).unwrap();
    let b = store.create("story", Metadata::new()).unwrap();
    store.update_status(&a.id, JobStatus::Running, None).unwrap();

    let running = store.list_by_status(JobStatus::Running).unwrap();
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].id, a.id);
    let created = store.list_by_status(JobStatus::Created).unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].id, b.id);
}

#[test]
fn list_skips_tmp_and_bak_debris() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let job = store.create("story", Metadata::new()).unwrap();
    store.update_status(&job.id, JobStatus::Running, None).unwrap();
    std::fs::write(dir.path().join("jobs/stray.json.tmp"), b"{").unwrap();

    let jobs = store.list().unwrap();
    assert_eq!(jobs.len(), 1);
}

#[test]
fn checkpoint_put_then_has_and_get() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let job = store.create("story", Metadata::new()).unwrap();

    assert!(!store.has(&job.id, "outline").unwrap());
    let cp = Checkpoint::new(job.id.clone(), "outline", "out/outline.json", &FakeClock::new());
    store.put(cp.clone(), false).unwrap();

    assert!(store.has(&job.id, "outline").unwrap());
    assert_eq!(store.load(&job.id, "outline").unwrap(), cp);
}

#[test]
fn double_put_without_overwrite_fails() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let job = store.create("story", Metadata::new()).unwrap();
    let cp = Checkpoint::new(job.id.clone(), "outline", "v1", &FakeClock::new());

    store.put(cp.clone(), false).unwrap();
    let err = store.put(cp.clone(), false).unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists { .. }));

    // Overwrite flag replaces explicitly
    let cp2 = Checkpoint::new(job.id.clone(), "outline", "v2", &FakeClock::new());
    store.put(cp2, true).unwrap();
    assert_eq!(store.load(&job.id, "outline").unwrap().output_ref, "v2");
}

#[test]
fn invalidate_from_removes_step_and_downstream_only() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let job = store.create("story", Metadata::new()).unwrap();
    let order = steps(&["step1", "step2", "step3", "step4"]);
    for name in &order {
        let cp = Checkpoint::new(job.id.clone(), name.clone(), "x", &FakeClock::new());
        store.put(cp, false).unwrap();
    }

    let removed = store.invalidate_from(&job.id, "step3", &order).unwrap();
    assert_eq!(removed, steps(&["step3", "step4"]));

    assert!(store.has(&job.id, "step1").unwrap());
    assert!(store.has(&job.id, "step2").unwrap());
    assert!(!store.has(&job.id, "step3").unwrap());
    assert!(!store.has(&job.id, "step4").unwrap());
}

#[test]
fn invalidate_from_unknown_step_errors() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let job = store.create("story", Metadata::new()).unwrap();
    let err = store.invalidate_from(&job.id, "bogus", &steps(&["step1"])).unwrap_err();
    assert!(matches!(err, StoreError::UnknownStep(_)));
}

#[test]
fn invalidate_from_skips_steps_without_checkpoints() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let job = store.create("story", Metadata::new()).unwrap();
    let order = steps(&["step1", "step2", "step3"]);
    let cp = Checkpoint::new(job.id.clone(), "step3", "x", &FakeClock::new());
    store.put(cp, false).unwrap();

    let removed = store.invalidate_from(&job.id, "step2", &order).unwrap();
    assert_eq!(removed, steps(&["step3"]));
}

#[test]
fn step_names_that_escape_the_directory_are_rejected() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let job = store.create("story", Metadata::new()).unwrap();
    for bad in ["", "a/b", "..", "a b"] {
        let err = store.has(&job.id, bad).unwrap_err();
        assert!(matches!(err, StoreError::InvalidStepName(_)), "{bad:?}");
    }
}

#[test]
fn checkpoints_survive_store_reopen() {
    let dir = tempdir().unwrap();
    let job_id;
    {
        let store = open_store(dir.path());
        let job = store.create("story", Metadata::new()).unwrap();
        job_id = job.id.clone();
        store.update_status(&job.id, JobStatus::Running, None).unwrap();
        let cp = Checkpoint::new(job.id.clone(), "outline", "out/outline.json", &FakeClock::new());
        store.put(cp, false).unwrap();
    }

    let store = open_store(dir.path());
    assert_eq!(store.get(&job_id).unwrap().status, JobStatus::Running);
    assert!(store.has(&job_id, "outline").unwrap());
}
