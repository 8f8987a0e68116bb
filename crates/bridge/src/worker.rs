// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-side protocol loop.
//!
//! Reads one request at a time from its input stream, dispatches by
//! operation name, writes exactly one response. A handler failure (or
//! panic) is answered with `ok:false` and the loop keeps serving; only
//! end-of-input terminates it. Workers know nothing about jobs, only
//! operations.

use crate::host::PING_OPERATION;
use crate::wire::{self, Args, Request, Response, WireError};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tracing::{debug, warn};

/// A handler's failure, serialized into the response's `error` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    pub kind: String,
    pub message: String,
    pub retryable: bool,
}

impl HandlerError {
    /// A failure that cannot succeed no matter how often it is retried.
    pub fn permanent(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: kind.into(), message: message.into(), retryable: false }
    }

    /// A transient failure the host may retry.
    pub fn retryable(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: kind.into(), message: message.into(), retryable: true }
    }

    /// Shorthand for the common bad-parameters case.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::permanent("InvalidArgs", message)
    }
}

impl From<HandlerError> for WireError {
    fn from(e: HandlerError) -> Self {
        WireError { kind: e.kind, message: e.message, retryable: e.retryable }
    }
}

pub type HandlerResult = Result<serde_json::Value, HandlerError>;

type BoxedHandler =
    Arc<dyn Fn(Args) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>> + Send + Sync>;

/// Fixed dispatch table plus the serve loop.
pub struct WorkerLoop {
    handlers: HashMap<String, BoxedHandler>,
}

impl Default for WorkerLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerLoop {
    /// An empty table with the built-in `__ping` health probe registered.
    pub fn new() -> Self {
        let mut this = Self { handlers: HashMap::new() };
        this.register(PING_OPERATION, |_args| async { Ok(serde_json::json!({"pong": true})) });
        this
    }

    /// Register a handler for an operation name (builder style).
    pub fn handler<F, Fut>(mut self, operation: impl Into<String>, f: F) -> Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register(operation, f);
        self
    }

    fn register<F, Fut>(&mut self, operation: impl Into<String>, f: F)
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handlers
            .insert(operation.into(), Arc::new(move |args| Box::pin(f(args))));
    }

    /// Serve until end of input. Handler failures never terminate the loop;
    /// only a closed input stream (the host hung up) returns.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut reader = BufReader::new(reader);
        loop {
            let request: Request = match wire::read_message(&mut reader).await {
                Ok(Some(request)) => request,
                Ok(None) => {
                    debug!("input stream closed, worker loop exiting");
                    return Ok(());
                }
                Err(wire::ProtocolError::Io(e)) => return Err(e),
                Err(e) => {
                    // A malformed line has no id to answer to; skip it
                    warn!(error = %e, "discarding malformed request");
                    continue;
                }
            };

            let response = self.dispatch(request).await;
            if let Err(e) = wire::write_message(&mut writer, &response).await {
                warn!(error = %e, "response write failed, worker loop exiting");
                return Ok(());
            }
        }
    }

    /// Serve on stdin/stdout, the normal worker-process entrypoint.
    pub async fn serve_stdio(&self) -> std::io::Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    async fn dispatch(&self, request: Request) -> Response {
        let Some(handler) = self.handlers.get(&request.operation) else {
            return Response::failure(
                request.id,
                WireError {
                    kind: "UnknownOperation".into(),
                    message: format!("no handler for operation: {}", request.operation),
                    retryable: false,
                },
            );
        };

        // Run the handler in its own task so a panic is contained to the
        // request that caused it.
        let handler = Arc::clone(handler);
        let args = request.args;
        let outcome = tokio::spawn(async move { handler(args).await }).await;

        match outcome {
            Ok(Ok(data)) => Response::success(request.id, data),
            Ok(Err(e)) => Response::failure(request.id, e.into()),
            Err(join_error) => {
                warn!(operation = %request.operation, "handler panicked");
                Response::failure(
                    request.id,
                    WireError {
                        kind: "HandlerPanicked".into(),
                        message: join_error.to_string(),
                        retryable: false,
                    },
                )
            }
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
