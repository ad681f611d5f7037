//! Smoke tests for the `artifact-viewer` binary.
//!
//! `run` is exercised against the binary's own `serve-stub` subcommand, so
//! a real child process answers the sandbox protocol over stdio.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const STORE_JSON: &str = r#"{
  "artifacts": {
    "default": [
      {
        "id": "html-page",
        "filename": "index.html",
        "filetype": "application/vnd.ant.html",
        "versions": [
          {"group_id": "html-page", "id": "v1", "version": 1, "filename": "index.html",
           "filetype": "application/vnd.ant.html",
           "code": "<!DOCTYPE html><html><body><h1>Hello</h1></body></html>", "is_done": true}
        ]
      },
      {
        "id": "notes",
        "filename": "notes.md",
        "filetype": "text/markdown",
        "versions": [
          {"group_id": "notes", "id": "v1", "version": 1, "filename": "notes.md",
           "filetype": "text/markdown", "code": "draft", "is_done": false},
          {"group_id": "notes", "id": "v2", "version": 2, "filename": "notes.md",
           "filetype": "text/markdown", "code": "final notes", "is_done": true}
        ]
      }
    ]
  }
}"#;

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_artifact-viewer")
}

fn viewer() -> Command {
    let mut cmd = Command::new(bin());
    // Keep a developer's own config and sandbox out of the picture.
    cmd.env("HOME", "/nonexistent-home")
        .env_remove("ARTIFACT_SANDBOX_CMD");
    cmd
}

fn write_store(dir: &Path) -> PathBuf {
    let path = dir.join("store.json");
    std::fs::write(&path, STORE_JSON).unwrap();
    path
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// ── Help / basic CLI ──────────────────────────────────────────────────────────

#[test]
fn binary_responds_to_help() {
    let output = viewer().arg("--help").output().expect("failed to execute");
    assert!(output.status.success());
    let text = stdout(&output);
    for subcommand in ["list", "show", "run", "export", "serve-stub"] {
        assert!(text.contains(subcommand), "help should list {subcommand}");
    }
}

#[test]
fn unknown_subcommand_exits_nonzero() {
    let output = viewer().arg("nonexistent-subcommand").output().unwrap();
    assert!(!output.status.success());
}

// ── Store commands ────────────────────────────────────────────────────────────

#[test]
fn list_shows_groups_and_versions() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_store(dir.path());

    let output = viewer().arg("list").arg("--store").arg(&store).output().unwrap();
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("default"));
    assert!(text.contains("html-page  index.html"));
    assert!(text.contains("v1  #1  (in progress)"));
    assert!(text.contains("v2  #2"));
}

#[test]
fn show_defaults_to_latest_version_of_group() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_store(dir.path());

    let output = viewer()
        .args(["show", "--group", "notes", "--store"])
        .arg(&store)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout(&output), "final notes\n");
}

#[test]
fn show_unknown_version_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_store(dir.path());

    let output = viewer()
        .args(["show", "--group", "notes", "--version", "v9", "--store"])
        .arg(&store)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no artifact notes@v9"));
}

#[test]
fn export_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_store(dir.path());
    let out = dir.path().join("out");

    let output = viewer()
        .args(["export", "--group", "html-page", "--store"])
        .arg(&store)
        .arg("--out")
        .arg(&out)
        .output()
        .unwrap();
    assert!(output.status.success());
    let written = std::fs::read_to_string(out.join("index.html")).unwrap();
    assert!(written.starts_with("<!DOCTYPE html>"));
}

// ── Run against a process sandbox ─────────────────────────────────────────────

#[test]
fn run_clean_page_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_store(dir.path());

    let output = viewer()
        .args(["run", "--group", "html-page", "--version", "v1", "--store"])
        .arg(&store)
        .args(["--sandbox-cmd", bin(), "--sandbox-arg", "serve-stub"])
        .args(["--sandbox-arg", "--ready-after", "--sandbox-arg", "2"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(stdout(&output), "ok: html-page@v1\n");
}

#[test]
fn run_with_errors_prints_report_and_sends_back() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_store(dir.path());

    let output = viewer()
        .args(["run", "--group", "html-page", "--send-back", "--store"])
        .arg(&store)
        .args(["--sandbox-cmd", bin(), "--sandbox-arg", "serve-stub"])
        .args(["--sandbox-arg", "--error", "--sandbox-arg", "Unexpected token"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let text = stdout(&output);
    assert!(text.starts_with("1. Error: Unexpected token\n"));
    assert!(text.contains(r#""groupId": "html-page""#));
    assert!(text.contains(r#""versionId": "v1""#));
}

#[test]
fn run_source_only_artifact_does_not_start_sandbox() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_store(dir.path());

    let output = viewer()
        .args(["run", "--group", "notes", "--store"])
        .arg(&store)
        .args(["--sandbox-cmd", "/nonexistent/sandbox"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("has no live preview (text/markdown)"));
}

#[test]
fn run_without_sandbox_command_fails_with_config_hint() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_store(dir.path());

    let output = viewer()
        .args(["run", "--group", "html-page", "--store"])
        .arg(&store)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ARTIFACT_SANDBOX_CMD"));
}

#[test]
fn run_with_stub_sandbox_needs_no_process() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_store(dir.path());

    let output = viewer()
        .args(["run", "--stub", "--group", "html-page", "--store"])
        .arg(&store)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout(&output), "ok: html-page@v1\n");
}
