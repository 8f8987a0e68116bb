// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded-retry policy with exponential backoff.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunable parameters for bounded retries with exponential backoff.
///
/// `max_attempts` counts every execution, including the first: a policy of
/// 3 allows the initial attempt plus two retries. Delays grow from
/// `initial_delay_ms` by `multiplier` per retry, clamped to `max_delay_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            multiplier: 2.0,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries (single attempt).
    pub fn none() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    /// Delay to wait before the retry following the given failed attempt
    /// (1-based). Returns `None` when the attempt budget is exhausted.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let ms = (self.initial_delay_ms as f64 * factor) as u64;
        Some(Duration::from_millis(ms.min(self.max_delay_ms)))
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
