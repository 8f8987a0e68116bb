// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sm_core::FakeClock;

fn mem_store() -> MemStore<FakeClock> {
    MemStore::new(FakeClock::new())
}

#[test]
fn create_get_update_round_trip() {
    let store = mem_store();
    let job = store.create("story", Metadata::new()).unwrap();
    assert_eq!(store.get(&job.id).unwrap().status, JobStatus::Created);

    let updated = store.update_status(&job.id, JobStatus::Running, None).unwrap();
    assert_eq!(updated.status, JobStatus::Running);
    assert_eq!(updated.version, 1);
}

#[test]
fn transitions_are_validated() {
    let store = mem_store();
    let job = store.create("story", Metadata::new()).unwrap();
    let err = store.update_status(&job.id, JobStatus::Cancelled, None).unwrap_err();
    assert!(matches!(err, StoreError::InvalidTransition(_)));
}

#[test]
fn checkpoint_put_once_matches_fs_contract() {
    let store = mem_store();
    let job = store.create("story", Metadata::new()).unwrap();
    let cp = Checkpoint::new(job.id.clone(), "outline", "v1", &FakeClock::new());

    store.put(cp.clone(), false).unwrap();
    assert!(matches!(store.put(cp, false).unwrap_err(), StoreError::AlreadyExists { .. }));
}

#[test]
fn invalidate_from_removes_suffix() {
    let store = mem_store();
    let job = store.create("story", Metadata::new()).unwrap();
    let order: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    for name in &order {
        let cp = Checkpoint::new(job.id.clone(), name.clone(), "x", &FakeClock::new());
        store.put(cp, false).unwrap();
    }

    let removed = store.invalidate_from(&job.id, "b", &order).unwrap();
    assert_eq!(removed, vec!["b".to_string(), "c".to_string()]);
    assert!(store.has(&job.id, "a").unwrap());
    assert!(!store.has(&job.id, "b").unwrap());
}

#[test]
fn list_scopes_to_job() {
    let store = mem_store();
    let a = store.create("story", Metadata::new()).unwrap();
    let b = store.create("story", Metadata::new()).unwrap();
    let cp = Checkpoint::new(a.id.clone(), "outline", "x", &FakeClock::new());
    store.put(cp, false).unwrap();

    assert_eq!(store.list_for(&a.id).unwrap().len(), 1);
    assert!(store.list_for(&b.id).unwrap().is_empty());
}
