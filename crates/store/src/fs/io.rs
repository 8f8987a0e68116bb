// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic JSON record IO.
//!
//! Records are written to a `.tmp` sibling, fsynced, then renamed over the
//! destination so a crash never leaves a half-written record. Replacing an
//! existing job record keeps the previous generation in a `.bak` sibling.

use crate::error::StoreResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    path.with_extension("json.tmp")
}

pub(crate) fn bak_path(path: &Path) -> PathBuf {
    path.with_extension("json.bak")
}

/// Write a JSON record atomically (tmp + fsync + rename).
pub(crate) fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let tmp = tmp_path(path);
    let bytes = serde_json::to_vec_pretty(value)?;
    let mut file = File::create(&tmp)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Replace an existing JSON record, copying the current generation to a
/// `.bak` sibling first. The rename itself stays atomic.
pub(crate) fn atomic_replace_json<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    if path.exists() {
        fs::copy(path, bak_path(path))?;
    }
    atomic_write_json(path, value)
}

/// Read a JSON record. IO errors (including NotFound) pass through raw;
/// callers map them to their domain error.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Whether a directory entry is a live record (not `.tmp`/`.bak` debris).
pub(crate) fn is_record(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}
