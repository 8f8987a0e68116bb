// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixture for CLI spec tests.

use std::path::PathBuf;
use std::process::Command;

/// A temp project: store directory, artifact directory, pipeline files.
pub struct Project {
    dir: tempfile::TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self { dir: tempfile::tempdir().expect("tempdir") }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn out_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    /// Write a pipeline file whose steps all run on one `gen` channel
    /// served by the real `sm-workerd` binary.
    pub fn pipeline(&self, steps: &[(&str, &str)], retry_attempts: u32) -> PathBuf {
        let mut toml = format!(
            "kind = \"story-video\"\ncall_timeout_ms = 30000\n\n\
             [retry]\nmax_attempts = {retry_attempts}\ninitial_delay_ms = 10\n\
             multiplier = 1.0\nmax_delay_ms = 10\n"
        );
        for (name, operation) in steps {
            toml.push_str(&format!(
                "\n[[steps]]\nname = \"{name}\"\nchannel = \"gen\"\noperation = \"{operation}\"\n"
            ));
        }
        toml.push_str(&format!(
            "\n[channels.gen]\nprogram = \"{}\"\nargs = [\"--out-dir\", \"{}\"]\n",
            workerd_bin().display(),
            self.out_dir().display()
        ));
        let path = self.dir.path().join("pipeline.toml");
        std::fs::write(&path, toml).expect("write pipeline");
        path
    }

    /// An `sm` invocation wired to this project's store.
    pub fn sm(&self) -> Command {
        let mut cmd = Command::new(sm_bin());
        cmd.env("SM_DATA_DIR", self.data_dir());
        cmd.env("SM_LOG", "error");
        cmd
    }
}

fn sm_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("sm")
}

fn workerd_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("sm-workerd")
}

/// Captured result of one CLI invocation.
pub struct CmdResult {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

pub fn run(cmd: &mut Command) -> CmdResult {
    let output = cmd.output().expect("spawn command");
    CmdResult {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}

impl CmdResult {
    pub fn passes(self) -> Self {
        assert_eq!(self.code, Some(0), "expected success\nstdout:\n{}\nstderr:\n{}", self.stdout, self.stderr);
        self
    }

    pub fn fails_with(self, code: i32) -> Self {
        assert_eq!(self.code, Some(code), "expected exit {code}\nstdout:\n{}\nstderr:\n{}", self.stdout, self.stderr);
        self
    }

    pub fn stdout_has(self, needle: &str) -> Self {
        assert!(self.stdout.contains(needle), "stdout missing {needle:?}:\n{}", self.stdout);
        self
    }

    pub fn stdout_lacks(self, needle: &str) -> Self {
        assert!(!self.stdout.contains(needle), "stdout unexpectedly has {needle:?}:\n{}", self.stdout);
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        assert!(self.stderr.contains(needle), "stderr missing {needle:?}:\n{}", self.stderr);
        self
    }

    /// First stdout line; `sm run` prints the new job id there.
    pub fn first_line(&self) -> String {
        self.stdout.lines().next().unwrap_or_default().to_string()
    }
}
