// Binary smoke tests: help text and the maintenance subcommands
// Each run happens in an empty directory so no config file or .env leaks in.

use assert_cmd::Command;
use predicates::prelude::*;

fn committee(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("procurement-committee").unwrap();
    cmd.current_dir(dir.path())
        .env("PROCUREMENT_STORAGE__BLOB_ROOT", dir.path().join("blobs"))
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let dir = tempfile::TempDir::new().unwrap();

    committee(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("recover"))
        .stdout(predicate::str::contains("reconcile"));
}

#[test]
fn test_config_prints_effective_settings() {
    let dir = tempfile::TempDir::new().unwrap();

    committee(&dir)
        .arg("config")
        .env("PROCUREMENT_SERVER__BIND_ADDRESS", "0.0.0.0:9090")
        .assert()
        .success()
        .stdout(predicate::str::contains("[server]"))
        .stdout(predicate::str::contains("0.0.0.0:9090"));
}

#[test]
fn test_config_write_creates_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let target = dir.path().join("written.toml");

    committee(&dir)
        .args(["config", "--write"])
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration written"));

    let written = std::fs::read_to_string(&target).unwrap();
    assert!(written.contains("[notifications]"));
}

#[test]
fn test_reconcile_on_empty_store_deletes_nothing() {
    let dir = tempfile::TempDir::new().unwrap();

    committee(&dir)
        .arg("reconcile")
        .assert()
        .success()
        .stdout(predicate::str::contains("Blobs deleted: 0"));
}

#[test]
fn test_unknown_subcommand_fails() {
    let dir = tempfile::TempDir::new().unwrap();

    committee(&dir).arg("launch").assert().failure();
}
