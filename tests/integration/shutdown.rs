#[path = "common/mod.rs"]
mod common;

use std::{
    fs,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use common::{
    RecordingSignaller, fast_timing, is_process_alive, shell_service, supervisor_for,
    wait_for_process_exit,
};
use nix::{errno::Errno, sys::signal::Signal, unistd::Pid};
use pidvisor::{
    config::{LaunchConfig, Timing},
    error::{ShutdownError, StopError},
    process::{Clock, ProcessSignaller},
    shutdown::ShutdownOutcome,
    supervisor::Supervisor,
};
use tempfile::tempdir;

/// A process that never exits on its own.
#[derive(Clone, Default)]
struct Unkillable {
    sent: Arc<Mutex<Vec<Signal>>>,
    checks: Arc<Mutex<u32>>,
    kill_result: Option<Errno>,
}

impl ProcessSignaller for Unkillable {
    fn send(&self, _pid: Pid, signal: Signal) -> Result<(), Errno> {
        self.sent.lock().unwrap().push(signal);
        match (signal, self.kill_result) {
            (Signal::SIGKILL, Some(errno)) => Err(errno),
            _ => Ok(()),
        }
    }

    fn is_alive(&self, _pid: Pid) -> bool {
        *self.checks.lock().unwrap() += 1;
        true
    }
}

#[derive(Clone, Default)]
struct InstantClock {
    elapsed: Arc<Mutex<Duration>>,
}

impl Clock for InstantClock {
    fn sleep(&self, duration: Duration) {
        *self.elapsed.lock().unwrap() += duration;
    }
}

fn supervisor_with_pidfile(dir: &std::path::Path, pid: &str) -> Supervisor {
    let supervisor = Supervisor::new(LaunchConfig::new(dir, dir));
    fs::create_dir_all(&supervisor.config().run_dir).unwrap();
    fs::write(&supervisor.config().pid_file, pid).unwrap();
    supervisor
}

#[test]
fn escalation_fires_once_after_a_simulated_minute() {
    let temp = tempdir().expect("failed to create tempdir");
    let signaller = Unkillable::default();
    let clock = InstantClock::default();
    let supervisor = supervisor_with_pidfile(temp.path(), "31337")
        .with_signaller(signaller.clone())
        .with_clock(clock.clone());

    let outcome = supervisor.stop().expect("kill should be delivered");

    assert_eq!(outcome, ShutdownOutcome::Killed);
    assert_eq!(
        *signaller.sent.lock().unwrap(),
        vec![Signal::SIGTERM, Signal::SIGKILL]
    );
    assert_eq!(*signaller.checks.lock().unwrap(), 60);
    assert_eq!(*clock.elapsed.lock().unwrap(), Duration::from_secs(60));
    assert!(!supervisor.config().pid_file.exists());
}

#[test]
fn failed_escalation_keeps_pidfile_and_reports_kill_failure() {
    let temp = tempdir().expect("failed to create tempdir");
    let signaller = Unkillable {
        kill_result: Some(Errno::EPERM),
        ..Unkillable::default()
    };
    let supervisor = supervisor_with_pidfile(temp.path(), "31337")
        .with_signaller(signaller)
        .with_clock(InstantClock::default());

    let err = supervisor.stop().expect_err("kill should fail");

    assert!(matches!(
        err,
        StopError::Shutdown(ShutdownError::KillFailed { pid: 31337, .. })
    ));
    assert_eq!(
        fs::read_to_string(&supervisor.config().pid_file).unwrap(),
        "31337"
    );
}

#[test]
fn process_ignoring_sigterm_is_killed() {
    let temp = tempdir().expect("failed to create tempdir");
    let signaller = RecordingSignaller::default();
    let supervisor = Supervisor::new(
        LaunchConfig::new(temp.path(), temp.path()).with_timing(Timing {
            max_polls: 3,
            ..fast_timing()
        }),
    )
    .with_signaller(signaller.clone());
    let mut service = shell_service("trap '' TERM; while :; do sleep 0.1; done");

    let record = supervisor.start(&mut service, &[]).expect("service should start");
    let pid = record.pid();
    let reaper = thread::spawn(move || record.wait());

    let outcome = supervisor.stop().expect("stop should succeed");
    reaper.join().unwrap().expect("failed to reap child");

    assert_eq!(outcome, ShutdownOutcome::Killed);
    assert_eq!(signaller.sent(), vec![Signal::SIGTERM, Signal::SIGKILL]);
    assert!(!supervisor.config().pid_file.exists());
    wait_for_process_exit(pid);
}

#[test]
fn process_with_slow_sigterm_handler_exits_without_escalation() {
    let temp = tempdir().expect("failed to create tempdir");
    let signaller = RecordingSignaller::default();
    let supervisor = supervisor_for(temp.path()).with_signaller(signaller.clone());
    let mut service =
        shell_service("trap 'sleep 0.3; exit 0' TERM; while :; do sleep 0.1; done");

    let record = supervisor.start(&mut service, &[]).expect("service should start");
    let pid = record.pid();
    let reaper = thread::spawn(move || record.wait());

    let outcome = supervisor.stop().expect("stop should succeed");
    reaper.join().unwrap().expect("failed to reap child");

    match outcome {
        ShutdownOutcome::Terminated { polls } => assert!(polls > 1),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(signaller.sent(), vec![Signal::SIGTERM]);
    assert!(!is_process_alive(pid));
}
