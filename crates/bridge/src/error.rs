// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bridge error taxonomy.

use crate::wire::WireError;

/// Classification of a failed bridge call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeErrorKind {
    /// No correlated response arrived within the deadline
    Timeout,
    /// The worker process exited while the call was outstanding
    WorkerCrashed,
    /// The caller cancelled the in-flight call
    Cancelled,
    /// Malformed message or broken field contract; a defect, not weather
    Protocol,
    /// The channel exhausted its respawn budget and is permanently failed
    ChannelFailed,
    /// The worker answered `ok:false`
    Handler,
}

sm_core::simple_display! {
    BridgeErrorKind {
        Timeout => "timeout",
        WorkerCrashed => "worker_crashed",
        Cancelled => "cancelled",
        Protocol => "protocol",
        ChannelFailed => "channel_failed",
        Handler => "handler",
    }
}

/// A failed bridge call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct BridgeError {
    pub kind: BridgeErrorKind,
    pub message: String,
    retryable: bool,
}

impl BridgeError {
    pub fn timeout(deadline_ms: u128) -> Self {
        Self {
            kind: BridgeErrorKind::Timeout,
            message: format!("no response within {deadline_ms}ms"),
            retryable: true,
        }
    }

    pub fn worker_crashed(message: impl Into<String>) -> Self {
        Self { kind: BridgeErrorKind::WorkerCrashed, message: message.into(), retryable: true }
    }

    pub fn cancelled() -> Self {
        Self {
            kind: BridgeErrorKind::Cancelled,
            message: "call cancelled by caller".into(),
            retryable: false,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self { kind: BridgeErrorKind::Protocol, message: message.into(), retryable: false }
    }

    pub fn channel_failed(message: impl Into<String>) -> Self {
        Self { kind: BridgeErrorKind::ChannelFailed, message: message.into(), retryable: false }
    }

    /// Wrap an `ok:false` response; the worker's own retryable flag decides.
    pub fn handler(error: WireError) -> Self {
        Self {
            kind: BridgeErrorKind::Handler,
            message: format!("{}: {}", error.kind, error.message),
            retryable: error.retryable,
        }
    }

    /// Whether the orchestrator's retry policy should apply.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}
