#![allow(dead_code)]

use std::{
    fs,
    path::Path,
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use nix::{errno::Errno, sys::signal::Signal, unistd::Pid};
use pidvisor::{
    config::{LaunchConfig, Timing},
    constants::MANIFEST_FILE_NAME,
    descriptor::CommandService,
    process::{NixSignaller, ProcessSignaller},
    supervisor::Supervisor,
};
use sysinfo::{ProcessStatus, ProcessesToUpdate, System};

/// Timing short enough for tests that launch real processes.
pub fn fast_timing() -> Timing {
    Timing {
        grace_window: Duration::from_millis(500),
        poll_interval: Duration::from_millis(100),
        max_polls: 20,
    }
}

pub fn supervisor_for(dir: &Path) -> Supervisor {
    Supervisor::new(LaunchConfig::new(dir, dir).with_timing(fast_timing()))
}

pub fn shell_service(script: &str) -> CommandService {
    CommandService::new(vec!["/bin/sh".into(), "-c".into(), script.into()])
}

pub fn write_manifest(install_dir: &Path, yaml: &str) {
    fs::write(install_dir.join(MANIFEST_FILE_NAME), yaml).expect("failed to write manifest");
}

pub fn read_pid(path: &Path) -> u32 {
    fs::read_to_string(path)
        .expect("failed to read pidfile")
        .trim()
        .parse()
        .expect("pidfile should contain a pid")
}

/// Pid of a process that has already exited and been reaped.
pub fn dead_pid() -> u32 {
    let mut child = std::process::Command::new("true")
        .spawn()
        .expect("failed to spawn true");
    let pid = child.id();
    child.wait().expect("failed to reap true");
    pid
}

pub fn is_process_alive(pid: u32) -> bool {
    let mut system = System::new();
    let target = sysinfo::Pid::from_u32(pid);
    system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
    system
        .process(target)
        .is_some_and(|process| !matches!(process.status(), ProcessStatus::Zombie))
}

pub fn wait_for_process_exit(pid: u32) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if !is_process_alive(pid) {
            return;
        }
        thread::sleep(Duration::from_millis(100));
    }

    panic!("Timed out waiting for PID {pid} to exit");
}

/// Real signaller that remembers every signal it delivered.
#[derive(Clone, Default)]
pub struct RecordingSignaller {
    sent: Arc<Mutex<Vec<Signal>>>,
}

impl RecordingSignaller {
    pub fn sent(&self) -> Vec<Signal> {
        self.sent.lock().unwrap().clone()
    }
}

impl ProcessSignaller for RecordingSignaller {
    fn send(&self, pid: Pid, signal: Signal) -> Result<(), Errno> {
        self.sent.lock().unwrap().push(signal);
        NixSignaller.send(pid, signal)
    }

    fn is_alive(&self, pid: Pid) -> bool {
        NixSignaller.is_alive(pid)
    }
}
