#[path = "common/mod.rs"]
mod common;

use std::{fs, path::Path};

use assert_cmd::cargo::cargo_bin_cmd;
use common::{dead_pid, is_process_alive, read_pid, wait_for_process_exit, write_manifest};
use predicates::prelude::*;
use tempfile::tempdir;

fn pidvisor(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("pidvisor");
    cmd.env_remove("RUST_LOG")
        .arg("-w")
        .arg(dir)
        .arg("-i")
        .arg(dir);
    cmd
}

fn pidfile(dir: &Path) -> std::path::PathBuf {
    dir.join("run").join("process.pid")
}

#[test]
fn stop_without_pidfile_exits_with_no_pidfile_code() {
    let temp = tempdir().expect("failed to create tempdir");

    pidvisor(temp.path())
        .arg("stop")
        .assert()
        .code(5)
        .stderr(predicate::str::contains(
            "No running process (did not find a pidfile). Aborting.",
        ));
}

#[test]
fn stop_with_empty_pidfile_aborts_and_keeps_it() {
    let temp = tempdir().expect("failed to create tempdir");
    fs::create_dir_all(temp.path().join("run")).unwrap();
    fs::write(pidfile(temp.path()), "").unwrap();

    pidvisor(temp.path()).arg("stop").assert().code(6);

    assert!(pidfile(temp.path()).exists());
}

#[test]
fn missing_working_directory_is_an_invalid_invocation() {
    let temp = tempdir().expect("failed to create tempdir");
    let missing = temp.path().join("absent");

    cargo_bin_cmd!("pidvisor")
        .arg("-w")
        .arg(&missing)
        .arg("-i")
        .arg(temp.path())
        .arg("status")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Working directory"));
}

#[test]
fn malformed_manifest_is_an_invalid_invocation() {
    let temp = tempdir().expect("failed to create tempdir");
    write_manifest(temp.path(), "runtime: [unterminated\n");

    pidvisor(temp.path()).arg("start").assert().code(1);
    assert!(!pidfile(temp.path()).exists());
}

#[test]
fn unset_manifest_variable_is_an_invalid_invocation() {
    let temp = tempdir().expect("failed to create tempdir");
    write_manifest(
        temp.path(),
        "runtime: command\ncommand: [\"sleep\", \"${PIDVISOR_TEST_UNSET_VAR}\"]\n",
    );

    pidvisor(temp.path())
        .env_remove("PIDVISOR_TEST_UNSET_VAR")
        .arg("start")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("PIDVISOR_TEST_UNSET_VAR"));
}

#[test]
fn status_reports_stopped_without_pidfile() {
    let temp = tempdir().expect("failed to create tempdir");

    pidvisor(temp.path())
        .arg("status")
        .assert()
        .code(5)
        .stdout(predicate::str::diff("stopped\n"));
}

#[test]
fn status_json_reports_stale_pidfile() {
    let temp = tempdir().expect("failed to create tempdir");
    fs::create_dir_all(temp.path().join("run")).unwrap();
    let pid = dead_pid();
    fs::write(pidfile(temp.path()), pid.to_string()).unwrap();

    let output = pidvisor(temp.path())
        .arg("status")
        .arg("--json")
        .output()
        .expect("status to execute");

    assert_eq!(output.status.code(), Some(9));
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("status should print JSON");
    assert_eq!(report["state"], "stale");
    assert_eq!(report["pid"], pid);
}

#[test]
fn java_runtime_without_java_fails_dependency_check() {
    let temp = tempdir().expect("failed to create tempdir");

    pidvisor(temp.path())
        .env("JAVA_HOME", temp.path().join("no-jdk"))
        .arg("start")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Could not find java command"));

    assert!(!pidfile(temp.path()).exists());
}

#[test]
fn crashing_command_replays_output_and_exits_with_launch_code() {
    let temp = tempdir().expect("failed to create tempdir");
    write_manifest(
        temp.path(),
        r#"
runtime: command
command: ["/bin/sh", "-c", "echo boom; echo 'missing config' >&2; exit 1"]
grace_period: "1s"
"#,
    );

    pidvisor(temp.path())
        .arg("start")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("<stdout>: boom"))
        .stderr(predicate::str::contains("<stderr>: missing config"));

    assert!(!pidfile(temp.path()).exists());
}

#[test]
fn command_manifest_start_status_stop_round() {
    let temp = tempdir().expect("failed to create tempdir");
    write_manifest(
        temp.path(),
        r#"
runtime: command
command: ["/bin/sh", "-c", "echo \"$@\"; exec sleep 30", "sh"]
args: ["--defaults"]
grace_period: "1s"
stop_timeout: "5s"
"#,
    );

    pidvisor(temp.path())
        .arg("start")
        .arg("--port")
        .arg("8080")
        .assert()
        .success();

    let pid = read_pid(&pidfile(temp.path()));
    assert!(is_process_alive(pid));
    assert_eq!(
        fs::read_to_string(temp.path().join("logs").join("stdout")).unwrap(),
        "--defaults --port 8080\n"
    );

    pidvisor(temp.path()).arg("start").assert().code(2);
    assert_eq!(read_pid(&pidfile(temp.path())), pid);

    pidvisor(temp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::starts_with(format!("running (pid {pid})")));

    pidvisor(temp.path()).arg("stop").assert().success();

    assert!(!pidfile(temp.path()).exists());
    wait_for_process_exit(pid);

    pidvisor(temp.path()).arg("stop").assert().code(5);
}

#[test]
fn restart_starts_fresh_instance() {
    let temp = tempdir().expect("failed to create tempdir");
    write_manifest(
        temp.path(),
        "runtime: command\ncommand: [\"sleep\", \"30\"]\ngrace_period: \"1s\"\n",
    );

    pidvisor(temp.path()).arg("restart").assert().success();
    let first = read_pid(&pidfile(temp.path()));

    pidvisor(temp.path()).arg("restart").assert().success();
    let second = read_pid(&pidfile(temp.path()));

    assert_ne!(first, second);
    wait_for_process_exit(first);
    assert!(is_process_alive(second));

    pidvisor(temp.path()).arg("stop").assert().success();
    wait_for_process_exit(second);
}

#[test]
fn runtime_flag_overrides_manifest() {
    let temp = tempdir().expect("failed to create tempdir");
    write_manifest(
        temp.path(),
        "runtime: command\ncommand: [\"sleep\", \"30\"]\n",
    );

    pidvisor(temp.path())
        .env("JAVA_HOME", temp.path().join("no-jdk"))
        .arg("--runtime")
        .arg("java")
        .arg("start")
        .assert()
        .code(3);
}

#[test]
fn zero_stop_timeout_is_an_invalid_invocation() {
    let temp = tempdir().expect("failed to create tempdir");
    write_manifest(
        temp.path(),
        "runtime: command\ncommand: [\"sleep\", \"30\"]\nstop_timeout: \"0s\"\n",
    );

    pidvisor(temp.path())
        .arg("start")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid duration value: '0s'"));

    assert!(!pidfile(temp.path()).exists());
}
