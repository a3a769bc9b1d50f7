//! CLI smoke tests: argument parsing and help output. Nothing here talks
//! to hardware.

use assert_cmd::Command;
use predicates::prelude::*;

fn linx() -> Command {
    Command::cargo_bin("linx").expect("binary builds")
}

#[test]
fn help_lists_subcommands() {
    linx()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("play"))
        .stdout(predicate::str::contains("brightness"))
        .stdout(predicate::str::contains("led"))
        .stdout(predicate::str::contains("wake"));
}

#[test]
fn version_flag_prints_version() {
    linx()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn missing_subcommand_fails_with_usage() {
    linx()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn play_requires_a_file_argument() {
    linx()
        .arg("play")
        .assert()
        .failure()
        .stderr(predicate::str::contains("FILE"));
}

#[test]
fn kill_without_pid_file_succeeds() {
    // No daemon and no device: kill reports nothing to do and exits 0.
    linx()
        .arg("kill")
        .assert()
        .success()
        .stdout(predicate::str::contains("No linx process running").or(
            predicate::str::contains("Stopped"),
        ));
}
