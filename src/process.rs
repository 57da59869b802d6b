//! Signal delivery, liveness probing, and the timer used by blocking waits.
//!
//! Both seams are traits so the launcher and the shutdown controller can be driven
//! by fakes in tests instead of real processes and wall-clock sleeps.
use std::{thread, time::Duration};

use nix::{
    errno::Errno,
    sys::signal::{self, Signal},
    unistd::Pid,
};
use sysinfo::{ProcessStatus, ProcessesToUpdate, System};

/// Sends signals to processes and checks whether they still exist.
pub trait ProcessSignaller {
    /// Delivers `signal` to `pid`.
    fn send(&self, pid: Pid, signal: Signal) -> Result<(), Errno>;

    /// Returns `true` while `pid` refers to a process that has not exited.
    fn is_alive(&self, pid: Pid) -> bool;
}

/// Blocking timer used by the grace window and the shutdown poll loop.
pub trait Clock {
    /// Blocks the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Real signal delivery through `kill(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NixSignaller;

impl ProcessSignaller for NixSignaller {
    fn send(&self, pid: Pid, signal: Signal) -> Result<(), Errno> {
        signal::kill(pid, Some(signal))
    }

    fn is_alive(&self, pid: Pid) -> bool {
        match signal::kill(pid, None) {
            Ok(()) => !is_zombie(pid),
            // The process exists but belongs to someone else.
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }
}

/// Wall-clock timer backed by `thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// A terminated child that its parent has not reaped still answers the null signal.
fn is_zombie(pid: Pid) -> bool {
    let Ok(raw) = u32::try_from(pid.as_raw()) else {
        return false;
    };

    let target = sysinfo::Pid::from_u32(raw);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
    system
        .process(target)
        .is_some_and(|process| matches!(process.status(), ProcessStatus::Zombie))
}
