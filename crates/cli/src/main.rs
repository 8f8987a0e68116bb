// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sm`: operate Storymill pipelines from the command line.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;
mod output;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sm", about = "Durable content-production pipeline runner", version)]
struct Cli {
    /// Store directory (default: $SM_DATA_DIR, then the user data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a job and run a pipeline to completion
    Run {
        /// Pipeline TOML file
        #[arg(long)]
        pipeline: PathBuf,
        /// Initial job metadata as key=value pairs
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },
    /// Resume a previously started job, skipping checkpointed steps
    Resume {
        job_id: String,
        #[arg(long)]
        pipeline: PathBuf,
    },
    /// Show one job's record and checkpoints
    Status { job_id: String },
    /// List jobs, optionally filtered by status
    List {
        #[arg(long)]
        status: Option<String>,
    },
    /// Explicitly cancel a job
    Cancel { job_id: String },
    /// Drop a step's checkpoint and everything downstream of it
    Invalidate {
        job_id: String,
        step: String,
        #[arg(long)]
        pipeline: PathBuf,
    },
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

fn resolve_data_dir(cli_dir: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(dir) = cli_dir {
        return Ok(dir);
    }
    if let Ok(dir) = std::env::var("SM_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    Ok(dirs::data_dir()
        .context("no user data directory; pass --data-dir")?
        .join("storymill"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir)?;

    let code = match cli.command {
        Command::Run { pipeline, meta } => commands::run::fresh(&data_dir, &pipeline, &meta).await?,
        Command::Resume { job_id, pipeline } => {
            commands::run::resume(&data_dir, &pipeline, &job_id).await?
        }
        Command::Status { job_id } => commands::jobs::status(&data_dir, &job_id)?,
        Command::List { status } => commands::jobs::list(&data_dir, status.as_deref())?,
        Command::Cancel { job_id } => commands::jobs::cancel(&data_dir, &job_id)?,
        Command::Invalidate { job_id, step, pipeline } => {
            commands::jobs::invalidate(&data_dir, &pipeline, &job_id, &step)?
        }
    };
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
