//! Error handling for pidvisor.
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

use crate::constants::{
    EXIT_ALREADY_RUNNING, EXIT_DEPENDENCY_FAILED, EXIT_EMPTY_PIDFILE,
    EXIT_INVALID_CONFIG, EXIT_KILL_FAILED, EXIT_LAUNCH_FAILED, EXIT_NO_PIDFILE,
    EXIT_SIGNAL_FAILED,
};

/// Error type for pidfile operations.
#[derive(Debug, Error)]
pub enum PidFileError {
    /// The pidfile does not exist.
    #[error("No pidfile found at {}", .0.display())]
    NotFound(PathBuf),

    /// The pidfile exists but has no content on its first line.
    #[error("Pidfile at {} is empty", .0.display())]
    Empty(PathBuf),

    /// The first line of the pidfile is not a decimal process id.
    #[error("Pidfile at {} does not contain a process id: '{content}'", .path.display())]
    Invalid {
        /// Location of the pidfile.
        path: PathBuf,
        /// The offending first line.
        content: String,
    },

    /// An exclusive create found a pidfile written by another invocation.
    #[error("Pidfile at {} already exists", .0.display())]
    AlreadyExists(PathBuf),

    /// Error reading, writing, or removing the pidfile.
    #[error("Pidfile I/O failed for {}: {source}", .path.display())]
    Io {
        /// Location of the pidfile.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },
}

/// Error type for loading the launch configuration and service manifest.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required directory does not exist.
    #[error("{kind} directory ({}) not found", .path.display())]
    MissingDirectory {
        /// Which directory was expected ("Working", "Install").
        kind: &'static str,
        /// The path that was checked.
        path: PathBuf,
    },

    /// The manifest exists but could not be read.
    #[error("Failed to read manifest {}: {source}", .path.display())]
    ManifestRead {
        /// Location of the manifest.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not valid YAML for the expected schema.
    #[error("Invalid manifest {}: {source}", .path.display())]
    ManifestParse {
        /// Location of the manifest.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },

    /// The manifest references an environment variable that is not set.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// A duration field could not be parsed.
    #[error("Invalid duration value: '{0}'")]
    InvalidDuration(String),

    /// The manifest is well-formed but semantically unusable.
    #[error("Invalid manifest: {0}")]
    Invalid(String),
}

/// Error type for the pre-flight dependency check.
#[derive(Debug, Error)]
pub enum DependencyError {
    /// `JAVA_HOME` is set but does not contain a java launcher.
    #[error("Could not find java command at {}", .0.display())]
    JavaHomeInvalid(PathBuf),

    /// `JAVA_HOME` is unset and no java launcher is on the `PATH`.
    #[error("Could not locate a java executable somewhere on the path")]
    JavaNotFound,

    /// No service jar was found in the install directory.
    #[error("Could not find a suitable jar file anywhere in {}", .0.display())]
    JarNotFound(PathBuf),

    /// The configured executable does not exist.
    #[error("Could not locate executable '{0}'")]
    ExecutableNotFound(String),

    /// The descriptor has no command to run.
    #[error("Service command is empty")]
    EmptyCommand,
}

/// Error type for launching the supervised process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Preparing the log/run directories or capture files failed.
    #[error("Failed to prepare {}: {source}", .path.display())]
    Io {
        /// The file or directory being prepared.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// The process could not be spawned at all.
    #[error("Failed to spawn `{command}`: {source}")]
    SpawnFailed {
        /// The rendered command line.
        command: String,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// The process exited before the grace window elapsed.
    #[error("Process {pid} terminated during launch ({status})")]
    ProcessDiedDuringGraceWindow {
        /// Process id of the dead child.
        pid: u32,
        /// Human-readable exit status.
        status: String,
    },

    /// Persisting the process id failed.
    #[error(transparent)]
    PidFile(#[from] PidFileError),
}

/// Error type for the terminate/poll/escalate protocol.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// The polite termination signal could not be delivered.
    #[error("Failed to send {signal} to process {pid}: {source}")]
    SignalDeliveryFailed {
        /// Target process id.
        pid: i32,
        /// Name of the signal.
        signal: &'static str,
        /// The errno reported by `kill(2)`.
        #[source]
        source: Errno,
    },

    /// The forceful kill could not be delivered after the poll window expired.
    #[error("Failed to send SIGKILL to process {pid}: {source}")]
    KillFailed {
        /// Target process id.
        pid: i32,
        /// The errno reported by `kill(2)`.
        #[source]
        source: Errno,
    },

    /// Removing the pidfile after termination failed.
    #[error(transparent)]
    PidFile(#[from] PidFileError),
}

/// Failure outcomes of `start`.
#[derive(Debug, Error)]
pub enum StartError {
    /// A pidfile is present, so an instance is presumed to be running.
    #[error("Found pidfile at {}, process is already running", .0.display())]
    AlreadyRunning(PathBuf),

    /// The descriptor's dependency check failed.
    #[error("Dependency check failed: {0}")]
    DependencyUnsatisfied(#[from] DependencyError),

    /// Spawning failed or the process died during the grace window.
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

impl StartError {
    /// Process exit code reported for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            StartError::AlreadyRunning(_) => EXIT_ALREADY_RUNNING,
            StartError::DependencyUnsatisfied(_) => EXIT_DEPENDENCY_FAILED,
            StartError::Launch(_) => EXIT_LAUNCH_FAILED,
        }
    }
}

/// Failure outcomes of `stop`.
#[derive(Debug, Error)]
pub enum StopError {
    /// There is no pidfile, so there is nothing to stop.
    #[error("No running process (did not find a pidfile at {})", .0.display())]
    NoPidfile(PathBuf),

    /// The pidfile is empty or unparsable; the operator must clean up manually.
    #[error("Pidfile at {} is empty or corrupt", .0.display())]
    EmptyPidfile(PathBuf),

    /// The terminate/poll/escalate protocol failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),

    /// Reading the pidfile failed for an unexpected reason.
    #[error(transparent)]
    PidFile(PidFileError),
}

impl From<PidFileError> for StopError {
    fn from(err: PidFileError) -> Self {
        match err {
            PidFileError::NotFound(path) => StopError::NoPidfile(path),
            PidFileError::Empty(path) | PidFileError::Invalid { path, .. } => {
                StopError::EmptyPidfile(path)
            }
            other => StopError::PidFile(other),
        }
    }
}

impl StopError {
    /// Process exit code reported for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            StopError::NoPidfile(_) => EXIT_NO_PIDFILE,
            StopError::EmptyPidfile(_) => EXIT_EMPTY_PIDFILE,
            StopError::Shutdown(ShutdownError::SignalDeliveryFailed { .. }) => {
                EXIT_SIGNAL_FAILED
            }
            StopError::Shutdown(ShutdownError::KillFailed { .. }) => EXIT_KILL_FAILED,
            StopError::Shutdown(ShutdownError::PidFile(_)) | StopError::PidFile(_) => {
                EXIT_INVALID_CONFIG
            }
        }
    }
}
