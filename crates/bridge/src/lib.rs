// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sm-bridge: Cross-process RPC between the engine and generation workers.
//!
//! Wire format: one JSON object per line (newline-delimited), one request
//! in flight per channel, responses correlated by request id.
//!
//! Host side: [`Bridge`] owns a channel-keyed registry of worker processes
//! (lazy spawn, reuse across calls, health probe, capped replacement).
//! Worker side: [`WorkerLoop`] reads requests from stdin, dispatches to a
//! fixed handler table, and never lets a handler failure kill the loop.

mod error;
mod host;
mod proc;
mod wire;
mod worker;

pub use error::{BridgeError, BridgeErrorKind};
pub use host::{Bridge, BridgeConfig, WorkerCommand, WorkerHandle};
pub use wire::{
    read_message, write_message, Args, ProtocolError, Request, Response, WireError,
    MAX_MESSAGE_BYTES,
};
pub use worker::{HandlerError, HandlerResult, WorkerLoop};
