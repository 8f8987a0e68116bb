// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command implementations. Each returns a process exit code: 0 for
//! success, 1 for a failed job, 2 for operator errors.

pub mod jobs;
pub mod run;

use sm_core::SystemClock;
use sm_store::FsStore;
use std::path::Path;

pub(crate) fn open_store(data_dir: &Path) -> anyhow::Result<FsStore<SystemClock>> {
    Ok(FsStore::open(data_dir, SystemClock)?)
}
