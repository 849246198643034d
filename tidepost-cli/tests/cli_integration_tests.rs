// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! CLI Integration Tests
//!
//! Exercises argument handling and failures that happen before any
//! network I/O.

use std::process::{Command, Output};

use tempfile::TempDir;

const KEY_HEX: &str = "2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a";

/// Helper to run CLI commands with a clean environment
struct CliTestContext {
    dir: TempDir,
}

impl CliTestContext {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_tidepost"))
            .current_dir(self.dir.path())
            .env_remove("TIDEPOST_RELAY_URL")
            .env_remove("TIDEPOST_RECOVERY_KEY")
            .env_remove("RUST_LOG")
            .args(args)
            .output()
            .expect("Failed to execute command")
    }

    fn run_success(&self, args: &[&str]) -> String {
        let output = self.run(args);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        assert!(
            output.status.success(),
            "Command {:?} failed.\nStdout: {}\nStderr: {}",
            args,
            stdout,
            stderr
        );
        stdout
    }

    fn run_failure(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            !output.status.success(),
            "Command {:?} should have failed but succeeded",
            args
        );
        String::from_utf8_lossy(&output.stderr).to_string()
    }

    fn write_file(&self, name: &str, contents: &[u8]) -> String {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).expect("Failed to write fixture");
        path.to_string_lossy().to_string()
    }
}

#[test]
fn test_help_lists_commands() {
    let ctx = CliTestContext::new();
    let stdout = ctx.run_success(&["--help"]);
    assert!(stdout.contains("backup"));
    assert!(stdout.contains("invite"));
    assert!(stdout.contains("completions"));
}

#[test]
fn test_completions_generate() {
    let ctx = CliTestContext::new();
    let stdout = ctx.run_success(&["completions", "bash"]);
    assert!(stdout.contains("tidepost"));
}

#[test]
fn test_backup_upload_requires_relay() {
    let ctx = CliTestContext::new();
    let input = ctx.write_file("backup.bin", b"blob");
    let stderr = ctx.run_failure(&["backup", "upload", &input, "--recovery-key", KEY_HEX]);
    assert!(stderr.contains("No relay configured"));
}

#[test]
fn test_backup_rejects_short_recovery_key() {
    let ctx = CliTestContext::new();
    let input = ctx.write_file("backup.bin", b"blob");
    let stderr = ctx.run_failure(&[
        "--relay",
        "ws://127.0.0.1:9",
        "backup",
        "upload",
        &input,
        "--recovery-key",
        "abcd",
    ]);
    assert!(stderr.contains("32 bytes"));
}

#[test]
fn test_backup_rejects_non_hex_recovery_key() {
    let ctx = CliTestContext::new();
    let stderr = ctx.run_failure(&[
        "--relay",
        "ws://127.0.0.1:9",
        "backup",
        "download",
        "out.bin",
        "--recovery-key",
        "not-hex",
    ]);
    assert!(stderr.contains("hex"));
}

#[test]
fn test_relay_must_be_websocket_url() {
    let ctx = CliTestContext::new();
    let stderr = ctx.run_failure(&["--relay", "https://relay.example.com", "invite", "accept", "r", "--by", "me"]);
    assert!(stderr.contains("ws://"));
}

#[test]
fn test_invalid_environment_is_reported() {
    let ctx = CliTestContext::new();
    let output = Command::new(env!("CARGO_BIN_EXE_tidepost"))
        .current_dir(ctx.dir.path())
        .env("TIDEPOST_FETCH_TIMEOUT_MS", "soon")
        .args(["--relay", "ws://127.0.0.1:9", "invite", "accept", "r", "--by", "me"])
        .output()
        .expect("Failed to execute command");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("TIDEPOST_FETCH_TIMEOUT_MS"));
}
