// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker process lifecycle helpers.

use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use crate::host::WorkerCommand;

/// Spawn a worker with piped stdin/stdout. Stderr is inherited so worker
/// logs land in the host's stderr stream.
pub(crate) fn spawn(command: &WorkerCommand) -> std::io::Result<(Child, ChildStdin, ChildStdout)> {
    let mut child = Command::new(&command.program)
        .args(&command.args)
        .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| std::io::Error::other("worker stdin not captured"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("worker stdout not captured"))?;

    debug!(program = %command.program, pid = child.id().unwrap_or_default(), "worker spawned");
    Ok((child, stdin, stdout))
}

/// Terminate a worker: wait briefly for a clean exit (the host has already
/// closed stdin, which is the worker's shutdown signal), then SIGTERM, then
/// kill.
pub(crate) async fn terminate(child: &mut Child, grace: Duration) {
    if wait_with_timeout(child, grace).await {
        return;
    }

    send_sigterm(child);
    if wait_with_timeout(child, grace).await {
        return;
    }

    warn!(pid = child.id().unwrap_or_default(), "worker ignored SIGTERM, killing");
    let _ = child.kill().await;
}

async fn wait_with_timeout(child: &mut Child, grace: Duration) -> bool {
    tokio::time::timeout(grace, child.wait()).await.is_ok()
}

#[cfg(unix)]
fn send_sigterm(child: &Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }
}

#[cfg(not(unix))]
fn send_sigterm(_child: &Child) {}
