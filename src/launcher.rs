//! Spawning the supervised process and verifying it survives the grace window.
use std::{
    fs::{self, File},
    io,
    os::unix::process::CommandExt,
    path::Path,
    process::{Child, Command, ExitStatus, Stdio},
};

use tracing::{debug, error, info, warn};

use crate::{
    config::LaunchConfig,
    descriptor::ServiceDescriptor,
    error::{LaunchError, PidFileError},
    logs::{DiagnosticSink, LogCapture},
    pidfile::{PidFileLock, PidFileStore},
    process::Clock,
};

/// A child that survived the grace window.
///
/// Owns the child handle and the capture files; dropping the record closes the
/// files but leaves the process running.
#[derive(Debug)]
pub struct ProcessRecord {
    pid: u32,
    child: Child,
    _stdout: File,
    _stderr: File,
}

impl ProcessRecord {
    /// Process id of the child.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Polls the child's exit status without blocking.
    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Blocks until the child exits and reaps it.
    pub fn wait(mut self) -> io::Result<ExitStatus> {
        self.child.wait()
    }
}

/// Spawns a service with redirected output and records its pid.
pub struct ProcessLauncher<'a> {
    config: &'a LaunchConfig,
    pid_file: PidFileStore,
    clock: &'a dyn Clock,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> ProcessLauncher<'a> {
    /// Creates a launcher for `config`, waiting with `clock` and replaying failures to `sink`.
    pub fn new(
        config: &'a LaunchConfig,
        clock: &'a dyn Clock,
        sink: &'a dyn DiagnosticSink,
    ) -> Self {
        Self {
            config,
            pid_file: PidFileStore::new(&config.pid_file),
            clock,
            sink,
        }
    }

    /// Launches the descriptor's command and waits out the grace window.
    ///
    /// The pidfile is claimed before anything else is touched, so a launch that
    /// finds another instance's pidfile leaves that instance's files alone. Every
    /// later failure releases the claimed pidfile before returning.
    pub fn launch<D>(
        &self,
        descriptor: &D,
        extra_args: &[String],
    ) -> Result<ProcessRecord, LaunchError>
    where
        D: ServiceDescriptor + ?Sized,
    {
        self.ensure_dir(&self.config.log_dir)?;
        self.ensure_dir(&self.config.run_dir)?;

        let mut lock = match self.pid_file.claim() {
            Ok(lock) => lock,
            Err(PidFileError::AlreadyExists(path)) => {
                warn!(
                    "Another instance recorded {} first; not launching",
                    path.display()
                );
                return Err(PidFileError::AlreadyExists(path).into());
            }
            Err(err) => {
                error!("Failed to claim pidfile: {err}");
                return Err(err.into());
            }
        };

        debug!(
            "stdout to {}, stderr to {}",
            self.config.stdout_file.display(),
            self.config.stderr_file.display()
        );
        let captures = self
            .open_capture(&self.config.stdout_file)
            .and_then(|stdout| Ok((stdout, self.open_capture(&self.config.stderr_file)?)));
        let (stdout, stderr) = match captures {
            Ok(files) => files,
            Err(err) => {
                release(lock);
                return Err(err);
            }
        };

        let command = descriptor.build_command(self.config, extra_args);
        let rendered = command.join(" ");
        debug!("Launching {rendered}");

        let mut child = match self.spawn(&command, &stdout, &stderr) {
            Ok(child) => child,
            Err(source) => {
                error!("Exception launching process `{rendered}`: {source}");
                release(lock);
                return Err(LaunchError::SpawnFailed {
                    command: rendered,
                    source,
                });
            }
        };

        let pid = child.id();
        debug!("Process is launched with pid {pid}");

        if let Err(err) = lock.record(pid) {
            error!("Failed to record pid {pid}: {err}");
            reap(&mut child);
            release(lock);
            return Err(err.into());
        }

        debug!("Waiting for process to start...");
        self.clock.sleep(self.config.timing.grace_window);

        match child.try_wait() {
            Ok(None) => {
                info!("Process is running with pid {pid}");
                Ok(ProcessRecord {
                    pid,
                    child,
                    _stdout: stdout,
                    _stderr: stderr,
                })
            }
            Ok(Some(status)) => {
                error!("Process ({rendered}) terminated when launching with {status}");
                let capture = LogCapture::new(self.sink);
                capture.dump(&self.config.stderr_file);
                capture.dump(&self.config.stdout_file);
                release(lock);
                Err(LaunchError::ProcessDiedDuringGraceWindow {
                    pid,
                    status: status.to_string(),
                })
            }
            Err(source) => {
                error!("Failed to poll process {pid}: {source}");
                reap(&mut child);
                let path = lock.path().to_path_buf();
                release(lock);
                Err(LaunchError::Io { path, source })
            }
        }
    }

    fn spawn(&self, command: &[String], stdout: &File, stderr: &File) -> io::Result<Child> {
        let (program, args) = command.split_first().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "empty command line")
        })?;

        Command::new(program)
            .args(args)
            .current_dir(&self.config.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout.try_clone()?))
            .stderr(Stdio::from(stderr.try_clone()?))
            .process_group(0)
            .spawn()
    }

    fn ensure_dir(&self, dir: &Path) -> Result<(), LaunchError> {
        fs::create_dir_all(dir).map_err(|source| LaunchError::Io {
            path: dir.to_path_buf(),
            source,
        })
    }

    fn open_capture(&self, path: &Path) -> Result<File, LaunchError> {
        File::create(path).map_err(|source| LaunchError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

}

/// Gives up a pidfile this launch claimed.
fn release(lock: PidFileLock) {
    if let Err(err) = lock.release() {
        warn!("Failed to clean up pidfile: {err}");
    }
}

/// Kills a child this launch no longer wants and reaps it.
fn reap(child: &mut Child) {
    if let Err(err) = child.kill() {
        debug!("Kill of pid {} failed: {err}", child.id());
    }
    let _ = child.wait();
}
