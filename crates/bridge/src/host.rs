// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-side bridge: a channel-keyed registry of worker processes.
//!
//! One worker process per channel, spawned lazily on first use and reused
//! across calls to amortize model/resource initialization. At most one
//! request is in flight per channel; a second call queues on the channel
//! mutex. A timed-out channel is marked suspect and health-probed before
//! its next call; a channel that exhausts its respawn budget is failed
//! permanently until [`Bridge::reset_channel`].

use crate::error::BridgeError;
use crate::proc;
use crate::wire::{self, Args, ProtocolError, Request, Response};
use serde::Deserialize;
use sm_core::{ChannelName, RetryPolicy};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Built-in health-probe operation every worker answers.
pub(crate) const PING_OPERATION: &str = "__ping";

/// How to launch one worker process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkerCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new(), env: BTreeMap::new() }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Bridge tuning knobs.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Worker command per channel.
    pub channels: HashMap<ChannelName, WorkerCommand>,
    /// Deadline for the `__ping` health probe on a suspect channel.
    pub probe_timeout: Duration,
    /// How long to wait for a worker to exit before escalating on shutdown.
    pub shutdown_grace: Duration,
    /// Backoff between worker respawn attempts; `max_attempts` is the
    /// respawn budget after which the channel is failed permanently.
    pub respawn_backoff: RetryPolicy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            channels: HashMap::new(),
            probe_timeout: Duration::from_secs(2),
            shutdown_grace: Duration::from_secs(2),
            respawn_backoff: RetryPolicy {
                max_attempts: 3,
                initial_delay_ms: 250,
                multiplier: 2.0,
                max_delay_ms: 5_000,
            },
        }
    }
}

impl BridgeConfig {
    pub fn with_channel(mut self, name: impl Into<ChannelName>, command: WorkerCommand) -> Self {
        self.channels.insert(name.into(), command);
        self
    }
}

/// A live connection to one worker process.
///
/// Reads are owned by a background task feeding an mpsc queue, so waiting
/// for a response stays cancellation-safe: an abandoned wait never tears a
/// frame in half, and a late response sits in the queue until the next
/// call discards it by id mismatch.
pub struct WorkerHandle {
    child: Option<tokio::process::Child>,
    writer: Option<Box<dyn AsyncWrite + Send + Unpin>>,
    responses: mpsc::Receiver<Result<Response, ProtocolError>>,
    reader_task: JoinHandle<()>,
}

impl WorkerHandle {
    fn new(
        child: Option<tokio::process::Child>,
        writer: impl AsyncWrite + Send + Unpin + 'static,
        reader: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        let (tx, rx) = mpsc::channel(8);
        let reader_task = tokio::spawn(read_loop(reader, tx));
        Self {
            child,
            writer: Some(Box::new(writer)),
            responses: rx,
            reader_task,
        }
    }

    fn from_command(command: &WorkerCommand) -> std::io::Result<Self> {
        let (child, stdin, stdout) = proc::spawn(command)?;
        Ok(Self::new(Some(child), stdin, stdout))
    }

    /// Wrap an in-memory transport instead of a process. For tests.
    #[cfg(any(test, feature = "test-support"))]
    pub fn from_io(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self::new(None, writer, reader)
    }

    async fn shutdown(mut self, grace: Duration) {
        self.reader_task.abort();
        // Closing stdin is the worker's clean-shutdown signal
        drop(self.writer.take());
        if let Some(mut child) = self.child.take() {
            proc::terminate(&mut child, grace).await;
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.reader_task.abort();
        if let Some(child) = &mut self.child {
            let _ = child.start_kill();
        }
    }
}

async fn read_loop(
    reader: impl AsyncRead + Send + Unpin + 'static,
    tx: mpsc::Sender<Result<Response, ProtocolError>>,
) {
    let mut reader = BufReader::new(reader);
    loop {
        match wire::read_message::<_, Response>(&mut reader).await {
            Ok(Some(response)) => {
                if tx.send(Ok(response)).await.is_err() {
                    return;
                }
            }
            Ok(None) => return, // EOF: dropping tx signals the crash
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                return;
            }
        }
    }
}

enum SlotState {
    /// No worker process; spawned lazily on next call
    Idle,
    Live(WorkerHandle),
    /// Respawn budget exhausted; every call fails until reset
    Failed(String),
}

struct ChannelSlot {
    command: WorkerCommand,
    state: SlotState,
    /// Set on timeout/protocol trouble; next call probes before reuse
    suspect: bool,
    /// Consecutive failed spawn/probe attempts
    respawns: u32,
}

/// Host-side RPC bridge.
pub struct Bridge {
    config: BridgeConfig,
    channels: parking_lot::Mutex<HashMap<ChannelName, Arc<tokio::sync::Mutex<ChannelSlot>>>>,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config, channels: parking_lot::Mutex::new(HashMap::new()) }
    }

    /// Call `operation` on `channel`, waiting up to `timeout` for the
    /// correlated response.
    pub async fn call(
        &self,
        channel: &ChannelName,
        operation: &str,
        args: Args,
        timeout: Duration,
    ) -> Result<serde_json::Value, BridgeError> {
        self.call_with_cancel(channel, operation, args, timeout, &CancellationToken::new()).await
    }

    /// [`Bridge::call`] with cooperative cancellation. Cancelling stops the
    /// wait and returns `Cancelled`; the worker may still be computing, and
    /// its late response is discarded by id mismatch on the channel's next
    /// call.
    pub async fn call_with_cancel(
        &self,
        channel: &ChannelName,
        operation: &str,
        args: Args,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, BridgeError> {
        let slot_ref = self.slot(channel)?;
        // One in-flight request per channel; later callers queue here
        let mut slot = slot_ref.lock().await;
        self.ensure_ready(channel, &mut slot).await?;

        let result = match &mut slot.state {
            SlotState::Live(handle) => {
                perform_call(handle, operation, args, timeout, cancel).await
            }
            _ => Err(BridgeError::worker_crashed("worker not running")),
        };
        self.settle(channel, &mut slot, &result).await;
        result
    }

    /// Clear a permanently failed channel so the next call respawns.
    pub fn reset_channel(&self, channel: &ChannelName) {
        if let Some(slot) = self.channels.lock().get(channel) {
            if let Ok(mut slot) = slot.try_lock() {
                if matches!(slot.state, SlotState::Failed(_)) {
                    slot.state = SlotState::Idle;
                    slot.respawns = 0;
                    slot.suspect = false;
                }
            }
        }
    }

    /// Shut down every live worker: close stdin, wait, escalate.
    pub async fn shutdown(&self) {
        let slots: Vec<_> = self.channels.lock().values().cloned().collect();
        for slot in slots {
            let mut slot = slot.lock().await;
            if let SlotState::Live(handle) = std::mem::replace(&mut slot.state, SlotState::Idle) {
                handle.shutdown(self.config.shutdown_grace).await;
            }
        }
    }

    /// Register a channel backed by an in-memory transport. For tests.
    #[cfg(any(test, feature = "test-support"))]
    pub fn inject_channel(&self, channel: impl Into<ChannelName>, handle: WorkerHandle) {
        let slot = ChannelSlot {
            command: WorkerCommand::new("/nonexistent/injected-worker"),
            state: SlotState::Live(handle),
            suspect: false,
            respawns: 0,
        };
        self.channels
            .lock()
            .insert(channel.into(), Arc::new(tokio::sync::Mutex::new(slot)));
    }

    fn slot(&self, channel: &ChannelName) -> Result<Arc<tokio::sync::Mutex<ChannelSlot>>, BridgeError> {
        let mut channels = self.channels.lock();
        if let Some(slot) = channels.get(channel) {
            return Ok(Arc::clone(slot));
        }
        let command = self
            .config
            .channels
            .get(channel)
            .cloned()
            .ok_or_else(|| BridgeError::channel_failed(format!("channel not configured: {channel}")))?;
        let slot = Arc::new(tokio::sync::Mutex::new(ChannelSlot {
            command,
            state: SlotState::Idle,
            suspect: false,
            respawns: 0,
        }));
        channels.insert(channel.clone(), Arc::clone(&slot));
        Ok(slot)
    }

    /// Bring the slot to a live, trusted worker: lazy spawn, probe suspect
    /// workers, replace on failure, all bounded by the respawn budget.
    async fn ensure_ready(
        &self,
        channel: &ChannelName,
        slot: &mut ChannelSlot,
    ) -> Result<(), BridgeError> {
        enum Next {
            Probe,
            Spawn,
        }

        loop {
            let next = match &slot.state {
                SlotState::Failed(msg) => return Err(BridgeError::channel_failed(msg.clone())),
                SlotState::Live(_) if !slot.suspect => return Ok(()),
                SlotState::Live(_) => Next::Probe,
                SlotState::Idle => Next::Spawn,
            };

            match next {
                Next::Probe => {
                    let probe = match &mut slot.state {
                        SlotState::Live(handle) => {
                            perform_call(
                                handle,
                                PING_OPERATION,
                                Args::new(),
                                self.config.probe_timeout,
                                &CancellationToken::new(),
                            )
                            .await
                        }
                        _ => continue,
                    };
                    if probe.is_ok() {
                        debug!(channel = %channel, "suspect worker passed health probe");
                        slot.suspect = false;
                        slot.respawns = 0;
                        return Ok(());
                    }
                    warn!(channel = %channel, "suspect worker failed health probe, replacing");
                    if let SlotState::Live(handle) =
                        std::mem::replace(&mut slot.state, SlotState::Idle)
                    {
                        handle.shutdown(self.config.shutdown_grace).await;
                    }
                    slot.suspect = false;
                    self.count_respawn(channel, slot).await?;
                }
                Next::Spawn => match WorkerHandle::from_command(&slot.command) {
                    Ok(handle) => {
                        slot.state = SlotState::Live(handle);
                    }
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "worker spawn failed");
                        self.count_respawn(channel, slot).await?;
                    }
                },
            }
        }
    }

    /// Record one failed spawn/probe attempt, backing off or failing the
    /// channel permanently when the budget is spent.
    async fn count_respawn(
        &self,
        channel: &ChannelName,
        slot: &mut ChannelSlot,
    ) -> Result<(), BridgeError> {
        slot.respawns += 1;
        match self.config.respawn_backoff.delay_after(slot.respawns) {
            Some(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            None => {
                let msg = format!(
                    "worker for channel {channel} failed {} consecutive spawn/probe attempts",
                    slot.respawns
                );
                warn!(channel = %channel, "channel failed permanently");
                slot.state = SlotState::Failed(msg.clone());
                Err(BridgeError::channel_failed(msg))
            }
        }
    }

    /// Update slot bookkeeping from a call result.
    async fn settle(
        &self,
        channel: &ChannelName,
        slot: &mut ChannelSlot,
        result: &Result<serde_json::Value, BridgeError>,
    ) {
        use crate::error::BridgeErrorKind::*;
        match result {
            Ok(_) => {
                slot.suspect = false;
                slot.respawns = 0;
            }
            Err(e) => match e.kind {
                Timeout => {
                    warn!(channel = %channel, "call timed out, marking channel suspect");
                    slot.suspect = true;
                }
                Protocol => {
                    // A torn or malformed stream is unusable; start fresh next call
                    warn!(channel = %channel, error = %e, "protocol error on channel");
                    if let SlotState::Live(handle) =
                        std::mem::replace(&mut slot.state, SlotState::Idle)
                    {
                        handle.shutdown(self.config.shutdown_grace).await;
                    }
                }
                WorkerCrashed => {
                    warn!(channel = %channel, "worker crashed mid-call");
                    if let SlotState::Live(handle) =
                        std::mem::replace(&mut slot.state, SlotState::Idle)
                    {
                        handle.shutdown(self.config.shutdown_grace).await;
                    }
                }
                Cancelled | ChannelFailed | Handler => {}
            },
        }
    }
}

/// Send one request and wait for its correlated response.
async fn perform_call(
    handle: &mut WorkerHandle,
    operation: &str,
    args: Args,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<serde_json::Value, BridgeError> {
    let request = Request::new(operation, args);
    let writer = handle
        .writer
        .as_mut()
        .ok_or_else(|| BridgeError::worker_crashed("worker stdin already closed"))?;
    wire::write_message(writer, &request)
        .await
        .map_err(|e| BridgeError::worker_crashed(format!("write failed: {e}")))?;

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Err(BridgeError::cancelled()),
            _ = &mut deadline => return Err(BridgeError::timeout(timeout.as_millis())),
            received = handle.responses.recv() => match received {
                Some(Ok(response)) if response.id == request.id => {
                    if !response.is_well_formed() {
                        return Err(BridgeError::protocol(format!(
                            "response for {} breaks the ok/data/error contract",
                            response.id
                        )));
                    }
                    return match (response.ok, response.error) {
                        (true, _) => Ok(response.data.unwrap_or(serde_json::Value::Null)),
                        (false, Some(error)) => Err(BridgeError::handler(error)),
                        (false, None) => Err(BridgeError::protocol("failure without error")),
                    };
                }
                Some(Ok(stale)) => {
                    // Late answer to a timed-out or cancelled call
                    debug!(stale_id = %stale.id, "discarding stale response");
                }
                Some(Err(e)) => return Err(BridgeError::protocol(e.to_string())),
                None => return Err(BridgeError::worker_crashed("worker closed its output stream")),
            },
        }
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
