//! Integration tests for the mpjob CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Run the binary from an empty directory with no user config in scope
fn mpjob(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("mpjob").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env_remove("MPJOB_THREADS")
        .env_remove("MPJOB_PROGRESS")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_help() {
    let home = TempDir::new().unwrap();
    mpjob(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("splits a collection of atoms into contiguous molecules"))
        .stdout(predicate::str::contains("partition"))
        .stdout(predicate::str::contains("barrier"));
}

#[test]
fn test_cli_version() {
    let home = TempDir::new().unwrap();
    mpjob(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mpjob"));
}

#[test]
fn test_invalid_subcommand() {
    let home = TempDir::new().unwrap();
    mpjob(&home)
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_partition_linear() {
    let home = TempDir::new().unwrap();
    mpjob(&home)
        .args(["partition", "10", "4"])
        .assert()
        .success()
        .stdout("0 3 5 8 10\n");
}

#[test]
fn test_partition_clamps_groups_to_atoms() {
    let home = TempDir::new().unwrap();
    mpjob(&home)
        .args(["partition", "5", "10"])
        .assert()
        .success()
        .stdout("0 1 2 3 4 5\n");
}

#[test]
fn test_partition_nested() {
    let home = TempDir::new().unwrap();
    mpjob(&home)
        .args(["partition", "10", "3", "--policy", "nested"])
        .assert()
        .success()
        .stdout("0 6 8 10\n");

    mpjob(&home)
        .args(["partition", "10", "3", "--policy", "nested", "--upper"])
        .assert()
        .success()
        .stdout("0 2 4 10\n");
}

#[test]
fn test_partition_rejects_zero_atoms() {
    let home = TempDir::new().unwrap();
    mpjob(&home)
        .args(["partition", "0", "4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid partition"));
}

#[test]
fn test_barrier_prints_one_row_per_path() {
    let home = TempDir::new().unwrap();
    let output = mpjob(&home)
        .args(["barrier", "--paths", "20", "--steps", "50", "--threads", "2", "--progress", "none"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8(output).unwrap();
    let indices: Vec<usize> = stdout
        .lines()
        .map(|line| line.split('\t').next().unwrap().parse().unwrap())
        .collect();
    assert_eq!(indices, (0..20).collect::<Vec<_>>());
}

#[test]
fn test_barrier_output_is_independent_of_threads() {
    let home = TempDir::new().unwrap();
    let run = |threads: &str, batches: &str| {
        mpjob(&home)
            .args(["barrier", "--paths", "40", "--steps", "80", "--width", "0.2"])
            .args(["--threads", threads, "--batches", batches, "--progress", "none"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone()
    };

    let sequential = run("1", "1");
    assert_eq!(sequential, run("4", "3"));
    assert_eq!(sequential, run("3", "2"));
}

#[test]
fn test_barrier_reports_progress_on_stderr() {
    let home = TempDir::new().unwrap();
    mpjob(&home)
        .args(["barrier", "--paths", "10", "--steps", "20"])
        .args(["--threads", "2", "--progress", "stderr"])
        .assert()
        .success()
        .stderr(predicate::str::contains("100.00% barrier_touch done after"))
        .stderr(predicate::str::contains("Remaining: 0.00 minutes."));
}

#[test]
fn test_barrier_quiet_suppresses_stderr() {
    let home = TempDir::new().unwrap();
    mpjob(&home)
        .args(["--quiet", "barrier", "--paths", "10", "--steps", "20", "--threads", "2"])
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

#[test]
fn test_config_shows_defaults() {
    let home = TempDir::new().unwrap();
    mpjob(&home)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("thread_percentage = 75"))
        .stdout(predicate::str::contains("partition = \"linear\""));
}

#[test]
fn test_config_layers_project_file_custom_file_and_env() {
    let home = TempDir::new().unwrap();
    fs::write(home.path().join("mpjob.toml"), "threads = 3\nbatches = 2\n").unwrap();
    let custom = home.path().join("custom.yaml");
    fs::write(&custom, "batches: 5\npartition: nested\n").unwrap();

    mpjob(&home)
        .env("MPJOB_THREADS", "6")
        .args(["config", "--json", "--config"])
        .arg(&custom)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"threads\": 6"))
        .stdout(predicate::str::contains("\"batches\": 5"))
        .stdout(predicate::str::contains("\"partition\": \"nested\""));
}

#[test]
fn test_invalid_config_is_rejected() {
    let home = TempDir::new().unwrap();
    fs::write(home.path().join("mpjob.toml"), "thread_percentage = 0\n").unwrap();

    mpjob(&home)
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("thread_percentage"));
}
