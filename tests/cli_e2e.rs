//! End-to-end CLI tests for the superdownload binary.

mod support;

use std::fs;
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use support::fake_aria2::{fault_on, start_fake_daemon};

fn superdownload(state: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("superdownload").unwrap();
    cmd.arg("--state-dir").arg(state.path()).env_remove("RUST_LOG");
    cmd
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let mut cmd = Command::cargo_bin("superdownload").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Queue downloads on an aria2 daemon"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let mut cmd = Command::cargo_bin("superdownload").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("superdownload"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    let mut cmd = Command::cargo_bin("superdownload").unwrap();
    cmd.arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_list_with_empty_history() {
    let state = TempDir::new().unwrap();
    superdownload(&state)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No downloads recorded."));

    // `list` is read-only: it must not start a run session.
    assert!(!state.path().join("log.txt").exists());
    assert!(!state.path().join("history.json").exists());
}

#[test]
fn test_verbose_flag_before_config_show() {
    let state = TempDir::new().unwrap();
    superdownload(&state)
        .args(["-v", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"maxConcurrent\""));
}

#[test]
fn test_misspelt_subcommand_fails() {
    let state = TempDir::new().unwrap();
    superdownload(&state)
        .arg("lsit")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_list_prints_history_lines() {
    let state = TempDir::new().unwrap();
    fs::write(
        state.path().join("history.json"),
        r#"[
            {"id":"2089b05ecca3d829","sourceUrl":"https://x/a.zip","filename":"a.zip","status":"complete","progress":1.0},
            {"id":"7f3a","sourceUrl":"https://x/b.iso","filename":"","status":"paused","progress":0.5}
        ]"#,
    )
    .unwrap();

    superdownload(&state)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("2089b05e  complete    100%  a.zip"))
        .stdout(predicate::str::contains("7f3a  paused       50%  https://x/b.iso"));
}

#[test]
fn test_list_json_outputs_array() {
    let state = TempDir::new().unwrap();
    fs::write(
        state.path().join("history.json"),
        r#"[{"id":"g1","sourceUrl":"https://x/a.zip","status":"error","error":"boom"}]"#,
    )
    .unwrap();

    let output = superdownload(&state)
        .args(["list", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value[0]["id"], "g1");
    assert_eq!(value[0]["error"], "boom");
}

#[test]
fn test_config_show_prints_defaults() {
    let state = TempDir::new().unwrap();
    superdownload(&state)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"maxConcurrent\": 3"))
        .stdout(predicate::str::contains("\"theme\": \"system\""));
}

#[test]
fn test_config_set_persists_and_keeps_other_keys() {
    let state = TempDir::new().unwrap();
    superdownload(&state)
        .args(["config", "set", "--max-concurrent", "6"])
        .assert()
        .success();
    superdownload(&state)
        .args(["config", "set", "--theme", "dark"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"maxConcurrent\": 6"))
        .stdout(predicate::str::contains("\"theme\": \"dark\""));

    let raw = fs::read_to_string(state.path().join("config.json")).unwrap();
    assert!(raw.contains("\"maxConcurrent\": 6"));
}

#[test]
fn test_config_set_without_values_fails() {
    let state = TempDir::new().unwrap();
    superdownload(&state)
        .args(["config", "set"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to change"));
}

/// With no daemon reachable, `run` records the URL and exits instead of waiting forever.
#[test]
fn test_run_without_daemon_saves_queue_and_exits() {
    let state = TempDir::new().unwrap();
    let downloads = TempDir::new().unwrap();
    superdownload(&state)
        .args(["config", "set", "--default-path"])
        .arg(downloads.path())
        .assert()
        .success();

    superdownload(&state)
        .args(["--rpc-port", "9", "run", "https://example.com/file.zip", "notaurl"])
        .timeout(Duration::from_secs(30))
        .assert()
        .success()
        .stderr(predicate::str::contains("degraded mode"))
        .stderr(predicate::str::contains("Skipping unsupported URL"));

    superdownload(&state)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("mock-"))
        .stdout(predicate::str::contains("queued"))
        .stdout(predicate::str::contains("file.zip"));
    assert!(state.path().join("log.txt").is_file());
}

/// A queued record the daemon no longer knows about must not keep `run` waiting.
#[tokio::test(flavor = "multi_thread")]
async fn test_run_exits_when_daemon_never_reports_on_stale_record() {
    let Some(server) = start_fake_daemon().await else {
        return;
    };
    fault_on(&server, "aria2.tellStatus", "GID mock-abc is not found").await;
    let state = TempDir::new().unwrap();
    fs::write(
        state.path().join("history.json"),
        r#"[{"id":"mock-abc","sourceUrl":"https://x/a.zip","filename":"a.zip","status":"queued"}]"#,
    )
    .unwrap();
    let address = server.address();
    let host = format!("http://{}", address.ip());
    let port = address.port().to_string();

    let (outcome, state) = tokio::task::spawn_blocking(move || {
        let outcome = superdownload(&state)
            .args(["--rpc-host", &host, "--rpc-port", &port, "--poll-interval-ms", "100", "run"])
            .timeout(Duration::from_secs(10))
            .assert();
        (outcome, state)
    })
    .await
    .unwrap();
    outcome
        .success()
        .stderr(predicate::str::contains("no longer waiting for it"));

    let history = fs::read_to_string(state.path().join("history.json")).unwrap();
    assert!(history.contains("\"queued\""));
}

/// With a transfer in flight, the first Ctrl-C only warns and the second quits.
#[cfg(unix)]
#[test]
fn test_second_interrupt_stops_run_with_downloads_in_flight() {
    use std::io::{BufRead, BufReader};
    use std::process::Stdio;
    use std::sync::mpsc;

    let state = TempDir::new().unwrap();
    fs::write(
        state.path().join("history.json"),
        r#"[{"id":"mock-abc","sourceUrl":"https://x/a.zip","filename":"a.zip","status":"active"}]"#,
    )
    .unwrap();

    let mut child = std::process::Command::new(assert_cmd::cargo::cargo_bin("superdownload"))
        .arg("--state-dir")
        .arg(state.path())
        .args(["--rpc-port", "9", "run", "--keep-running"])
        .env_remove("RUST_LOG")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let (lines_tx, lines_rx) = mpsc::channel();
    let stderr = child.stderr.take().unwrap();
    std::thread::spawn(move || {
        for line in BufReader::new(stderr).lines().map_while(Result::ok) {
            if lines_tx.send(line).is_err() {
                break;
            }
        }
    });
    let wait_for_line = |needle: &str| loop {
        let line = lines_rx.recv_timeout(Duration::from_secs(15)).unwrap();
        if line.contains(needle) {
            break;
        }
    };
    let interrupt = |pid: u32| {
        let status = std::process::Command::new("kill")
            .args(["-INT", &pid.to_string()])
            .status()
            .unwrap();
        assert!(status.success());
    };

    wait_for_line("Watching download queue");
    interrupt(child.id());
    wait_for_line("press Ctrl-C again");
    assert!(child.try_wait().unwrap().is_none());
    interrupt(child.id());
    wait_for_line("Interrupted; stopping");

    let mut exit = None;
    for _ in 0..100 {
        exit = child.try_wait().unwrap();
        if exit.is_some() {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    if exit.is_none() {
        let _ = child.kill();
    }
    assert!(exit.is_some_and(|status| status.success()));
}
