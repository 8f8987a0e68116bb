// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire messages and the newline-delimited JSON codec.
//!
//! One self-delimited text record per message. `data` and `error` are
//! always present on a response (`null` when absent) so the contract is
//! visible on the wire: `ok:false` implies `error` is non-null and `data`
//! is null; `ok:true` implies `error` is null.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sm_core::RequestId;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Upper bound on one encoded message, generous enough for prompt payloads.
pub const MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;

/// Open map of operation parameters.
pub type Args = serde_json::Map<String, serde_json::Value>;

/// Errors at the framing/encoding layer.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("message exceeds {MAX_MESSAGE_BYTES} bytes")]
    Oversized,
}

/// A single RPC request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation token; round-trips byte-for-byte.
    pub id: RequestId,
    /// Handler name in the worker's dispatch table.
    pub operation: String,
    #[serde(default)]
    pub args: Args,
}

impl Request {
    /// Build a request with a fresh correlation id.
    pub fn new(operation: impl Into<String>, args: Args) -> Self {
        Self { id: RequestId::new(), operation: operation.into(), args }
    }
}

/// Structured failure description carried in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireError {
    pub kind: String,
    pub message: String,
    /// Whether the worker believes a retry could succeed.
    #[serde(default)]
    pub retryable: bool,
}

/// The exactly-one response to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: RequestId,
    pub ok: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<WireError>,
}

impl Response {
    pub fn success(id: RequestId, data: serde_json::Value) -> Self {
        Self { id, ok: true, data: Some(data), error: None }
    }

    pub fn failure(id: RequestId, error: WireError) -> Self {
        Self { id, ok: false, data: None, error: Some(error) }
    }

    /// Check the `ok`/`data`/`error` field contract.
    pub fn is_well_formed(&self) -> bool {
        if self.ok {
            self.error.is_none()
        } else {
            self.error.is_some() && self.data.is_none()
        }
    }
}

/// Write one message as a single JSON line and flush.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(message)?;
    if line.len() > MAX_MESSAGE_BYTES {
        return Err(ProtocolError::Oversized);
    }
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one message from a buffered reader.
///
/// Returns `Ok(None)` on a clean end of stream. The size limit is enforced
/// after the line is read; a peer that streams an unbounded line without a
/// newline is cut off by the transport, not by this codec.
pub async fn read_message<R, T>(reader: &mut BufReader<R>) -> Result<Option<T>, ProtocolError>
where
    R: tokio::io::AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    if line.len() > MAX_MESSAGE_BYTES {
        return Err(ProtocolError::Oversized);
    }
    Ok(Some(serde_json::from_str(line.trim_end())?))
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
