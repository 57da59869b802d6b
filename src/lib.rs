//! pidvisor launches a single long-running service in the background, records its
//! process id in a pidfile, and later stops it with a polite signal followed by a
//! forceful kill if the service does not exit in time. Failed launches replay the
//! service's captured output so the operator can see what went wrong.

/// CLI interface.
pub mod cli;

/// Launch configuration and service manifest.
pub mod config;

/// Directory layout, timing defaults, and exit codes.
pub mod constants;

/// Dependency checks and command lines per runtime.
pub mod descriptor;

/// Error handling.
pub mod error;

/// Spawning the service and the grace-window check.
pub mod launcher;

/// Replay of captured output on failure.
pub mod logs;

/// Pidfile persistence.
pub mod pidfile;

/// Signal delivery, liveness checks, and timers.
pub mod process;

/// Terminate, poll, and escalate protocol.
pub mod shutdown;

/// Status reporting.
pub mod status;

/// Orchestrates start, stop, restart, and status.
pub mod supervisor;
