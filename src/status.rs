//! Status reporting for the supervised service.
use std::{fs, path::PathBuf};

use chrono::{DateTime, Local, Utc};
use nix::unistd::Pid;
use serde::Serialize;
use tracing::debug;

use crate::{
    constants::{EXIT_EMPTY_PIDFILE, EXIT_NO_PIDFILE, EXIT_STALE_PIDFILE, EXIT_SUCCESS},
    error::PidFileError,
    pidfile::PidFileStore,
    process::ProcessSignaller,
};

/// What the pidfile says about the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    /// The pidfile names a live process.
    Running,
    /// The pidfile names a process that no longer exists.
    Stale,
    /// There is no pidfile.
    Stopped,
    /// The pidfile is empty or unreadable.
    Corrupt,
}

/// Snapshot of the pidfile and the process it names.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Derived service state.
    pub state: ServiceState,
    /// Recorded process id, if readable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Location of the pidfile.
    pub pid_file: PathBuf,
    /// When the pidfile was written, which is when the process was launched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
}

impl StatusReport {
    /// Inspects `pid_file` and checks the process it names.
    pub fn collect(pid_file: &PidFileStore, signaller: &dyn ProcessSignaller) -> Self {
        let since = fs::metadata(pid_file.path())
            .and_then(|meta| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        let (state, pid) = match pid_file.read() {
            Ok(pid) => {
                let alive = signaller.is_alive(Pid::from_raw(pid as i32));
                debug!("Pid {pid} alive: {alive}");
                let state = if alive {
                    ServiceState::Running
                } else {
                    ServiceState::Stale
                };
                (state, Some(pid))
            }
            Err(PidFileError::NotFound(_)) => (ServiceState::Stopped, None),
            Err(err) => {
                debug!("Unable to read pidfile: {err}");
                (ServiceState::Corrupt, None)
            }
        };

        Self {
            state,
            pid,
            pid_file: pid_file.path().to_path_buf(),
            since: if state == ServiceState::Stopped { None } else { since },
        }
    }

    /// Process exit code reported by the `status` command.
    pub fn exit_code(&self) -> i32 {
        match self.state {
            ServiceState::Running => EXIT_SUCCESS,
            ServiceState::Stale => EXIT_STALE_PIDFILE,
            ServiceState::Stopped => EXIT_NO_PIDFILE,
            ServiceState::Corrupt => EXIT_EMPTY_PIDFILE,
        }
    }

    /// One-line human-readable summary.
    pub fn render(&self) -> String {
        let since = self
            .since
            .map(|at| {
                format!(
                    " since {}",
                    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
                )
            })
            .unwrap_or_default();

        match (self.state, self.pid) {
            (ServiceState::Running, Some(pid)) => format!("running (pid {pid}){since}"),
            (ServiceState::Stale, Some(pid)) => format!(
                "not running: stale pidfile {} names pid {pid}{since}",
                self.pid_file.display()
            ),
            (ServiceState::Corrupt, _) => format!(
                "unknown: pidfile {} is empty or corrupt",
                self.pid_file.display()
            ),
            _ => "stopped".to_string(),
        }
    }
}
