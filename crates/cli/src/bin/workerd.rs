// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sm-workerd`: the stock generation worker.
//!
//! Speaks the bridge protocol on stdin/stdout and hosts stub
//! implementations of the generation operations plus fault-injection
//! operations used by the spec tests. Stateless with respect to jobs:
//! every request carries everything it needs.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use clap::Parser;
use sm_bridge::{Args, HandlerError, WorkerLoop};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "sm-workerd", about = "Storymill generation worker", version)]
struct WorkerdArgs {
    /// Directory to write artifacts into; without it, refs are virtual
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Worker profile tag, for log correlation when several channels share
    /// this binary
    #[arg(long, default_value = "default")]
    profile: String,
}

fn str_arg<'a>(args: &'a Args, key: &str) -> Result<&'a str, HandlerError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerError::invalid_args(format!("missing string arg: {key}")))
}

/// Write an artifact (or mint a virtual ref) and return its reference.
fn store_artifact(
    out_dir: &Option<PathBuf>,
    job_id: &str,
    step: &str,
    content: &serde_json::Value,
) -> Result<String, HandlerError> {
    let Some(out_dir) = out_dir else {
        return Ok(format!("mem:{job_id}/{step}"));
    };
    let dir = out_dir.join(job_id);
    std::fs::create_dir_all(&dir)
        .map_err(|e| HandlerError::retryable("Io", format!("create {}: {e}", dir.display())))?;
    let path = dir.join(format!("{step}.json"));
    let bytes = serde_json::to_vec_pretty(content)
        .map_err(|e| HandlerError::permanent("Serde", e.to_string()))?;
    std::fs::write(&path, bytes)
        .map_err(|e| HandlerError::retryable("Io", format!("write {}: {e}", path.display())))?;
    Ok(path.display().to_string())
}

fn generation_response(output_ref: String, facts: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "output_ref": output_ref, "facts": facts })
}

fn build_loop(out_dir: Option<PathBuf>) -> WorkerLoop {
    let out_dir = Arc::new(out_dir);
    let flaky_tripped = Arc::new(AtomicBool::new(false));

    let text_out = Arc::clone(&out_dir);
    let speech_out = Arc::clone(&out_dir);
    let video_out = Arc::clone(&out_dir);

    WorkerLoop::new()
        .handler("generate_text", move |args| {
            let out_dir = Arc::clone(&text_out);
            async move {
                let job_id = str_arg(&args, "job_id")?.to_string();
                let step = str_arg(&args, "step").unwrap_or("generate_text").to_string();
                let title = args
                    .get("metadata")
                    .and_then(|m| m.get("title"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("Untitled");
                let script = serde_json::json!({
                    "title": title,
                    "scenes": [
                        { "line": format!("{title} begins at dusk.") },
                        { "line": "The keeper climbs the stairs." },
                        { "line": format!("{title} ends at dawn.") },
                    ],
                });
                let words = 14u64;
                let output_ref = store_artifact(&out_dir, &job_id, &step, &script)?;
                Ok(generation_response(output_ref, serde_json::json!({ "words": words })))
            }
        })
        .handler("synthesize_speech", move |args| {
            let out_dir = Arc::clone(&speech_out);
            async move {
                let job_id = str_arg(&args, "job_id")?.to_string();
                let step = str_arg(&args, "step").unwrap_or("synthesize_speech").to_string();
                let inputs = args.get("inputs").cloned().unwrap_or(serde_json::json!({}));
                let narration = serde_json::json!({ "voice": "keeper", "from": inputs });
                let output_ref = store_artifact(&out_dir, &job_id, &step, &narration)?;
                Ok(generation_response(output_ref, serde_json::json!({ "duration_s": 42 })))
            }
        })
        .handler("render_frames", move |args| {
            let out_dir = Arc::clone(&video_out);
            async move {
                let job_id = str_arg(&args, "job_id")?.to_string();
                let step = str_arg(&args, "step").unwrap_or("render_frames").to_string();
                let frames = serde_json::json!({ "fps": 24, "count": 1008 });
                let output_ref = store_artifact(&out_dir, &job_id, &step, &frames)?;
                Ok(generation_response(output_ref, serde_json::json!({ "frames": 1008 })))
            }
        })
        .handler("flaky_once", move |args| {
            let tripped = Arc::clone(&flaky_tripped);
            async move {
                if !tripped.swap(true, Ordering::SeqCst) {
                    return Err(HandlerError::retryable("ResourceBusy", "first attempt always fails"));
                }
                let job_id = str_arg(&args, "job_id").unwrap_or("unknown").to_string();
                Ok(generation_response(format!("mem:{job_id}/flaky"), serde_json::json!({})))
            }
        })
        .handler("always_fail", |_args| async {
            Err(HandlerError::permanent("Unsatisfiable", "this operation never succeeds"))
        })
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("SM_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_tracing();
    let args = WorkerdArgs::parse();
    info!(profile = %args.profile, "sm-workerd serving on stdio");
    build_loop(args.out_dir).serve_stdio().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generate_text_produces_a_script_ref() {
        let dir = tempfile::tempdir().unwrap();
        let worker = build_loop(Some(dir.path().to_path_buf()));

        let (host, worker_end) = tokio::io::duplex(64 * 1024);
        let (worker_read, worker_write) = tokio::io::split(worker_end);
        tokio::spawn(async move {
            let _ = worker.serve(worker_read, worker_write).await;
        });

        let (host_read, mut host_write) = tokio::io::split(host);
        let mut reader = tokio::io::BufReader::new(host_read);

        let mut args = Args::new();
        args.insert("job_id".into(), serde_json::json!("job-x"));
        args.insert("step".into(), serde_json::json!("generate_script"));
        args.insert("metadata".into(), serde_json::json!({"title": "The Lighthouse"}));
        let request = sm_bridge::Request::new("generate_text", args);
        sm_bridge::write_message(&mut host_write, &request).await.unwrap();

        let response: sm_bridge::Response =
            sm_bridge::read_message(&mut reader).await.unwrap().unwrap();
        assert!(response.ok);
        let data = response.data.unwrap();
        let path = data["output_ref"].as_str().unwrap();
        assert!(std::path::Path::new(path).exists());
        let script: serde_json::Value =
            serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(script["title"], "The Lighthouse");
    }

    #[tokio::test]
    async fn flaky_once_fails_then_succeeds() {
        let worker = build_loop(None);
        let (host, worker_end) = tokio::io::duplex(64 * 1024);
        let (worker_read, worker_write) = tokio::io::split(worker_end);
        tokio::spawn(async move {
            let _ = worker.serve(worker_read, worker_write).await;
        });
        let (host_read, mut host_write) = tokio::io::split(host);
        let mut reader = tokio::io::BufReader::new(host_read);

        let mut args = Args::new();
        args.insert("job_id".into(), serde_json::json!("job-x"));
        for expect_ok in [false, true] {
            let request = sm_bridge::Request::new("flaky_once", args.clone());
            sm_bridge::write_message(&mut host_write, &request).await.unwrap();
            let response: sm_bridge::Response =
                sm_bridge::read_message(&mut reader).await.unwrap().unwrap();
            assert_eq!(response.ok, expect_ok);
            if !expect_ok {
                assert!(response.error.unwrap().retryable);
            }
        }
    }
}
