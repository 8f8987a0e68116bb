// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-level fatal errors.
//!
//! A step failing is not an `EngineError`; that outcome lives on the job
//! record. These errors mean the run itself could not proceed: the store is
//! unreliable or the configuration is unusable. A store failure aborts the
//! run *without* marking the job `Failed`, since a store that cannot be
//! written to cannot be trusted to record the failure either.

use sm_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    #[error("pipeline configuration: {0}")]
    Config(String),
}
