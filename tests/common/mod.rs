// tests/common/mod.rs
// Shared test utilities for integration tests
#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tempfile::TempDir;

const BINARY: &str = env!("CARGO_BIN_EXE_mergetail");

fn base_command(args: &[&str]) -> Command {
    let mut cmd = Command::new(BINARY);
    cmd.args(args)
        .env_remove("NO_COLOR")
        .env_remove("FORCE_COLOR")
        .env_remove("MERGETAIL_LOG");
    cmd
}

/// Run mergetail with the given arguments and input via stdin.
/// Config files are ignored unless the arguments name one.
pub fn run_mergetail_with_input(args: &[&str], input: &str) -> (String, String, i32) {
    run_mergetail_with_env(args, input, &[])
}

pub fn run_mergetail_with_env(
    args: &[&str],
    input: &str,
    env: &[(&str, &str)],
) -> (String, String, i32) {
    let mut full_args = Vec::new();
    if !args.iter().any(|a| a.starts_with("--config-file")) {
        full_args.push("--ignore-config");
    }
    full_args.extend_from_slice(args);

    let mut cmd = base_command(&full_args);
    cmd.envs(env.iter().copied());
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start mergetail");

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .expect("Failed to write to stdin");
    }

    let output = child.wait_with_output().expect("Failed to read output");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Log files written into a temporary directory
pub struct LogDir {
    dir: TempDir,
}

impl LogDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn write(&self, file_name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(file_name);
        std::fs::write(&path, content).expect("Failed to write log file");
        path
    }
}

/// Write each `(file name, content)` pair and run mergetail on the files.
pub fn run_mergetail_with_files(args: &[&str], files: &[(&str, &str)]) -> (String, String, i32) {
    let logs = LogDir::new();
    let paths: Vec<String> = files
        .iter()
        .map(|(name, content)| logs.write(name, content).to_string_lossy().into_owned())
        .collect();

    let mut full_args = args.to_vec();
    full_args.extend(paths.iter().map(String::as_str));
    run_mergetail_with_input(&full_args, "")
}
