//! Constants and configuration values for pidvisor.
//!
//! This module centralizes the directory layout, file names, timing values, and
//! exit codes shared by the launcher, the shutdown controller, and the binary.

use std::time::Duration;

// ============================================================================
// File System Layout
// ============================================================================

/// Directory under the working directory holding captured process output.
pub const LOG_DIR_NAME: &str = "logs";

/// Directory under the working directory holding the pidfile.
pub const RUN_DIR_NAME: &str = "run";

/// File name of the captured standard output stream.
pub const STDOUT_FILE_NAME: &str = "stdout";

/// File name of the captured standard error stream.
pub const STDERR_FILE_NAME: &str = "stderr";

/// Name of the pidfile stored in the run directory.
/// Contains a single decimal process id on its first line.
pub const PID_FILE_NAME: &str = "process.pid";

/// Optional service manifest looked up in the install directory.
pub const MANIFEST_FILE_NAME: &str = "pidvisor.yaml";

// ============================================================================
// Java Runtime Lookup
// ============================================================================

/// Environment variable pointing at a JVM installation.
pub const JAVA_HOME_VAR: &str = "JAVA_HOME";

/// Name of the java launcher binary.
pub const JAVA_EXECUTABLE: &str = "java";

/// Directory under the install directory searched for the service jar.
pub const JAR_DIR_NAME: &str = "bin";

/// Suffix identifying a self-contained service jar.
pub const JAR_SUFFIX: &str = "-jar-with-dependencies.jar";

// ============================================================================
// Process Management Timing
// ============================================================================

/// How long a freshly spawned process must stay alive before the launch counts as
/// successful. Misconfigured command lines typically exit well within this window.
pub const DEFAULT_GRACE_WINDOW: Duration = Duration::from_secs(2);

/// Interval between liveness checks after the polite termination signal.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Number of liveness checks before escalating to a forceful kill.
pub const DEFAULT_MAX_POLLS: u32 = 60;

// ============================================================================
// Exit Codes
// ============================================================================

/// Operation completed successfully.
pub const EXIT_SUCCESS: i32 = 0;

/// Invalid invocation, unreadable configuration, or an unexpected I/O failure.
pub const EXIT_INVALID_CONFIG: i32 = 1;

/// `start` found an existing pidfile.
pub const EXIT_ALREADY_RUNNING: i32 = 2;

/// `start` aborted because the dependency check failed.
pub const EXIT_DEPENDENCY_FAILED: i32 = 3;

/// `start` could not spawn the process, or it died during the grace window.
pub const EXIT_LAUNCH_FAILED: i32 = 4;

/// `stop`/`status` found no pidfile.
pub const EXIT_NO_PIDFILE: i32 = 5;

/// `stop` found an empty or unparsable pidfile.
pub const EXIT_EMPTY_PIDFILE: i32 = 6;

/// `stop` could not deliver the polite termination signal.
pub const EXIT_SIGNAL_FAILED: i32 = 7;

/// `stop` could not deliver the forceful kill after the poll window expired.
pub const EXIT_KILL_FAILED: i32 = 8;

/// `status` found a pidfile whose process is gone.
pub const EXIT_STALE_PIDFILE: i32 = 9;
