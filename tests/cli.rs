//! Binary-level checks: exit codes and what reaches the user on stderr.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_manual-pipeline"))
        .arg("--config")
        .arg(root.join("pipeline.toml"))
        .args(args)
        .output()
        .unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn build_without_drafts_names_the_translate_stage() {
    let tmp = TempDir::new().unwrap();
    let output = run(tmp.path(), &["build"]);

    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.starts_with("Error: Drafts directory not found"), "{err}");
    assert!(err.contains("(run `manual-pipeline translate` first)"), "{err}");
}

#[test]
fn manifest_without_parts_names_the_build_stage() {
    let tmp = TempDir::new().unwrap();
    let output = run(tmp.path(), &["manifest"]);

    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("(run `manual-pipeline build` first)"), "{err}");
    assert!(!err.contains("MissingParts"), "{err}");
}

#[test]
fn verify_drafts_fails_without_drafts() {
    let tmp = TempDir::new().unwrap();
    let output = run(tmp.path(), &["verify", "--drafts"]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Drafts directory not found"), "{stdout}");
}

#[test]
fn gen_config_prints_stock_file() {
    let tmp = TempDir::new().unwrap();
    let output = run(tmp.path(), &["gen-config"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[images]"), "{stdout}");
}
