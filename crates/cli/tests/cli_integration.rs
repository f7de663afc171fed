//! End-to-end tests for the `dirwatch` binary

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn dirwatch() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_dirwatch"));
    command.env("RUST_LOG", "warn");
    command
}

/// Kills the child when the test ends, pass or fail
struct Running(Child);

impl Drop for Running {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

#[test]
fn test_example_config_parses() {
    let output = dirwatch().arg("example-config").output().unwrap();
    assert!(output.status.success());

    let text = String::from_utf8(output.stdout).unwrap();
    let value: toml::Value = toml::from_str(&text).unwrap();
    assert_eq!(value["watch"].as_array().unwrap().len(), 3);
}

#[test]
fn test_run_with_missing_config_fails() {
    let temp_dir = TempDir::new().unwrap();
    let output = dirwatch()
        .args(["run"])
        .arg(temp_dir.path().join("missing.toml"))
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read config file"), "stderr: {}", stderr);
}

#[test]
fn test_unknown_notify_category_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let output = dirwatch()
        .arg("watch")
        .arg(temp_dir.path())
        .args(["--notify", "file_name,colour"])
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[test]
fn test_watch_prints_json_records() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("watched");

    let child = dirwatch()
        .arg("watch")
        .arg(&root)
        .args(["--json", "--poll-ms", "20"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let mut running = Running(child);
    let stdout = running.0.stdout.take().unwrap();

    let (line_tx, line_rx) = mpsc::channel();
    thread::spawn(move || {
        for line in BufReader::new(stdout).lines().map_while(Result::ok) {
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    // The binary creates the root on open
    for _ in 0..250 {
        if root.is_dir() {
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }
    // Give the watch a moment to register after the root appears
    thread::sleep(Duration::from_millis(300));
    std::fs::create_dir(root.join("incoming")).unwrap();

    let line = line_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("a record on stdout");
    let record: serde_json::Value = serde_json::from_str(&line).unwrap();

    assert_eq!(record["change_type"], "NewFolder");
    assert_eq!(record["name"], "incoming");
    assert!(record.get("old_path").is_none());
}
