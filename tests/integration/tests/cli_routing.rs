//! CLI binary integration tests.
//!
//! These run the compiled `capsec` binary with `CAPSEC_HOME` pointed at a
//! temporary directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Locate the compiled `capsec` binary in the workspace target directory.
fn capsec_bin() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    // tests/integration -> workspace root
    let workspace_root = manifest_dir
        .parent()
        .expect("tests/ parent")
        .parent()
        .expect("workspace root");
    let target = std::env::var_os("CARGO_TARGET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| workspace_root.join("target"));
    let bin = target.join("debug").join("capsec");
    assert!(
        bin.exists(),
        "capsec binary not found at {}; run `cargo build -p capsec-cli` first",
        bin.display()
    );
    bin
}

fn capsec(home: &Path, args: &[&str]) -> Output {
    Command::new(capsec_bin())
        .env("CAPSEC_HOME", home)
        .env_remove("CAPSEC_CONFIG")
        .env_remove("CAPSEC_APP_ID")
        .env_remove("CAPSEC_FORCE_BASIC")
        .args(args)
        .output()
        .expect("failed to run capsec")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_cli_version() {
    let home = TempDir::new().unwrap();
    let output = capsec(home.path(), &["version"]);
    assert!(output.status.success(), "version command should succeed");
    assert!(stdout(&output).contains("capsec"));
}

#[test]
fn test_cli_help() {
    let home = TempDir::new().unwrap();
    let output = capsec(home.path(), &["--help"]);
    assert!(output.status.success(), "--help should succeed");
    let text = stdout(&output);
    for command in ["set", "get", "keys", "remove", "clear", "doctor"] {
        assert!(text.contains(command), "help should mention '{command}'");
    }
}

#[test]
fn test_cli_unknown_command() {
    let home = TempDir::new().unwrap();
    let output = capsec(home.path(), &["frobnicate"]);
    assert!(!output.status.success());
}

#[test]
fn test_cli_set_get_remove() {
    let home = TempDir::new().unwrap();

    let output = capsec(home.path(), &["set", "token", "--value", "s3cret"]);
    assert!(output.status.success(), "set failed: {:?}", output);

    let output = capsec(home.path(), &["get", "token"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "s3cret");

    let output = capsec(home.path(), &["keys"]);
    assert!(stdout(&output).contains("token"));

    let output = capsec(home.path(), &["remove", "token"]);
    assert!(output.status.success());

    // Reading or removing a missing entry is an error.
    assert!(!capsec(home.path(), &["get", "token"]).status.success());
    assert!(!capsec(home.path(), &["remove", "token"]).status.success());
}

#[test]
fn test_cli_clear_with_yes() {
    let home = TempDir::new().unwrap();
    capsec(home.path(), &["set", "a", "--value", "1"]);
    capsec(home.path(), &["set", "b", "--value", "2"]);

    let output = capsec(home.path(), &["clear", "--yes"]);
    assert!(output.status.success());

    let output = capsec(home.path(), &["keys"]);
    assert!(stdout(&output).contains("No entries stored"));
}

#[test]
fn test_cli_config_init_and_path() {
    let home = TempDir::new().unwrap();

    let output = capsec(home.path(), &["config", "path"]);
    assert!(output.status.success());
    let path = PathBuf::from(stdout(&output).trim());
    assert_eq!(path, home.path().join("capsec.json5"));

    assert!(capsec(home.path(), &["config", "init"]).status.success());
    assert!(path.exists());
    assert!(home.path().join("data").is_dir());
    assert!(home.path().join("vault").is_dir());
    assert!(!capsec(home.path(), &["config", "init"]).status.success());

    let output = capsec(home.path(), &["config", "get", "storage.namespace"]);
    assert!(stdout(&output).contains("cap_sec"));
}

#[test]
fn test_cli_platform() {
    let home = TempDir::new().unwrap();
    let output = capsec(home.path(), &["platform"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), std::env::consts::OS);
}
