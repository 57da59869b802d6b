//! Graceful shutdown: SIGTERM, poll for exit, escalate to SIGKILL.
use std::time::Duration;

use nix::{errno::Errno, sys::signal::Signal, unistd::Pid};
use tracing::{debug, error, info, warn};

use crate::{
    config::Timing,
    error::ShutdownError,
    pidfile::PidFileStore,
    process::{Clock, ProcessSignaller},
};

/// States of the terminate protocol. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    /// Deliver the polite termination signal.
    Signal,
    /// Check for exit once per interval.
    Poll,
    /// Deliver the forceful kill.
    Escalate,
    /// Remove the pidfile and report success.
    Cleanup,
}

/// How a successful shutdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The process was already gone when the polite signal was sent.
    AlreadyStopped,
    /// The process exited after the polite signal, seen on check number `polls`.
    Terminated {
        /// Number of liveness checks performed.
        polls: u32,
    },
    /// The process ignored the polite signal and was killed.
    Killed,
}

/// Runs the terminate → poll → escalate → cleanup protocol against one pid.
pub struct ShutdownController<'a> {
    pid_file: PidFileStore,
    signaller: &'a dyn ProcessSignaller,
    clock: &'a dyn Clock,
    poll_interval: Duration,
    max_polls: u32,
}

impl<'a> ShutdownController<'a> {
    /// Creates a controller that removes `pid_file` once the process is gone.
    pub fn new(
        pid_file: PidFileStore,
        signaller: &'a dyn ProcessSignaller,
        clock: &'a dyn Clock,
        timing: &Timing,
    ) -> Self {
        Self {
            pid_file,
            signaller,
            clock,
            poll_interval: timing.poll_interval,
            max_polls: timing.max_polls,
        }
    }

    /// Terminates `pid` and removes the pidfile.
    ///
    /// A failed SIGKILL leaves the pidfile in place for the operator.
    pub fn terminate(&self, pid: Pid) -> Result<ShutdownOutcome, ShutdownError> {
        let mut state = ShutdownState::Signal;
        let mut outcome = ShutdownOutcome::AlreadyStopped;

        loop {
            debug!("Shutdown of pid {pid} entering {state:?}");
            state = match state {
                ShutdownState::Signal => {
                    debug!("sending SIGTERM to pid {pid}");
                    match self.signaller.send(pid, Signal::SIGTERM) {
                        Ok(()) => ShutdownState::Poll,
                        Err(Errno::ESRCH) => {
                            info!("Process {pid} is not running; clearing pidfile");
                            outcome = ShutdownOutcome::AlreadyStopped;
                            ShutdownState::Cleanup
                        }
                        Err(source) => {
                            error!(
                                "Got error trying to send SIGTERM to process {pid}: {source}"
                            );
                            return Err(ShutdownError::SignalDeliveryFailed {
                                pid: pid.as_raw(),
                                signal: Signal::SIGTERM.as_str(),
                                source,
                            });
                        }
                    }
                }
                ShutdownState::Poll => match self.poll_for_exit(pid) {
                    Some(polls) => {
                        debug!("Process {pid} stopped after {polls} check(s)");
                        outcome = ShutdownOutcome::Terminated { polls };
                        ShutdownState::Cleanup
                    }
                    None => {
                        warn!(
                            "Process {pid} is still running after {} checks. Terminating it with SIGKILL",
                            self.max_polls
                        );
                        ShutdownState::Escalate
                    }
                },
                ShutdownState::Escalate => match self.signaller.send(pid, Signal::SIGKILL) {
                    Ok(()) => {
                        outcome = ShutdownOutcome::Killed;
                        ShutdownState::Cleanup
                    }
                    Err(Errno::ESRCH) => {
                        debug!("Process {pid} exited before SIGKILL could be delivered");
                        outcome = ShutdownOutcome::Terminated {
                            polls: self.max_polls,
                        };
                        ShutdownState::Cleanup
                    }
                    Err(source) => {
                        error!("Failed to forcefully terminate process {pid}: {source}");
                        return Err(ShutdownError::KillFailed {
                            pid: pid.as_raw(),
                            source,
                        });
                    }
                },
                ShutdownState::Cleanup => {
                    self.pid_file.remove()?;
                    info!("Process {pid} stopped");
                    return Ok(outcome);
                }
            };
        }
    }

    /// Returns the check number on which the process was found gone.
    fn poll_for_exit(&self, pid: Pid) -> Option<u32> {
        for attempt in 1..=self.max_polls {
            if !self.signaller.is_alive(pid) {
                return Some(attempt);
            }
            self.clock.sleep(self.poll_interval);
        }
        None
    }
}
