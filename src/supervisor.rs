use nix::unistd::Pid;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    config::LaunchConfig,
    descriptor::ServiceDescriptor,
    error::{LaunchError, PidFileError, StartError, StopError},
    launcher::{ProcessLauncher, ProcessRecord},
    logs::{DiagnosticSink, TracingSink},
    pidfile::PidFileStore,
    process::{Clock, NixSignaller, ProcessSignaller, SystemClock},
    shutdown::{ShutdownController, ShutdownOutcome},
    status::StatusReport,
};

/// Errors emitted by compound supervisor operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Start(#[from] StartError),
    #[error(transparent)]
    Stop(#[from] StopError),
}

impl SupervisorError {
    /// Process exit code reported for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            SupervisorError::Start(err) => err.exit_code(),
            SupervisorError::Stop(err) => err.exit_code(),
        }
    }
}

/// Starts and stops one service instance per working directory.
///
/// Signal delivery, waiting, and failure diagnostics go through the handles held
/// here, so tests can swap any of them out.
pub struct Supervisor {
    config: LaunchConfig,
    pid_file: PidFileStore,
    signaller: Box<dyn ProcessSignaller>,
    clock: Box<dyn Clock>,
    sink: Box<dyn DiagnosticSink>,
}

impl Supervisor {
    /// Creates a supervisor using real signals, wall-clock waits, and `tracing` output.
    pub fn new(config: LaunchConfig) -> Self {
        Self {
            pid_file: PidFileStore::new(&config.pid_file),
            config,
            signaller: Box::new(NixSignaller),
            clock: Box::new(SystemClock),
            sink: Box::new(TracingSink),
        }
    }

    /// Replaces the signal delivery handle.
    pub fn with_signaller(mut self, signaller: impl ProcessSignaller + 'static) -> Self {
        self.signaller = Box::new(signaller);
        self
    }

    /// Replaces the timer used for the grace window and shutdown polling.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Replaces the channel receiving replayed output on launch failure.
    pub fn with_sink(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// The launch configuration this supervisor operates on.
    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    /// Checks dependencies, launches the service, and verifies it survived the
    /// grace window.
    pub fn start<D>(
        &self,
        descriptor: &mut D,
        extra_args: &[String],
    ) -> Result<ProcessRecord, StartError>
    where
        D: ServiceDescriptor + ?Sized,
    {
        if self.pid_file.exists() {
            warn!(
                "Found existing pidfile at {}; process is already running",
                self.pid_file.path().display()
            );
            return Err(StartError::AlreadyRunning(self.pid_file.path().to_path_buf()));
        }

        info!(
            "Starting {} service in {}",
            descriptor.name(),
            self.config.working_dir.display()
        );

        if let Err(err) = descriptor.check_dependencies(&self.config) {
            error!("{err}");
            return Err(err.into());
        }

        let launcher =
            ProcessLauncher::new(&self.config, self.clock.as_ref(), self.sink.as_ref());
        match launcher.launch(descriptor, extra_args) {
            Ok(record) => Ok(record),
            Err(LaunchError::PidFile(PidFileError::AlreadyExists(path))) => {
                warn!("Lost the race for {}; another start won", path.display());
                Err(StartError::AlreadyRunning(path))
            }
            Err(err) => {
                error!("Process did NOT start: {err}");
                Err(err.into())
            }
        }
    }

    /// Stops the process named by the pidfile.
    pub fn stop(&self) -> Result<ShutdownOutcome, StopError> {
        debug!("Pidfile is at {}", self.pid_file.path().display());

        if !self.pid_file.exists() {
            warn!("No running process (did not find a pidfile). Aborting.");
            return Err(StopError::NoPidfile(self.pid_file.path().to_path_buf()));
        }

        let pid = match self.pid_file.read() {
            Ok(pid) => pid,
            Err(err) => {
                warn!("{err}; remove it manually once the process is confirmed gone");
                return Err(err.into());
            }
        };

        let controller = ShutdownController::new(
            self.pid_file.clone(),
            self.signaller.as_ref(),
            self.clock.as_ref(),
            &self.config.timing,
        );

        controller
            .terminate(Pid::from_raw(pid as i32))
            .map_err(StopError::from)
    }

    /// Stops the running instance, if any, and starts a new one.
    pub fn restart<D>(
        &self,
        descriptor: &mut D,
        extra_args: &[String],
    ) -> Result<ProcessRecord, SupervisorError>
    where
        D: ServiceDescriptor + ?Sized,
    {
        match self.stop() {
            Ok(outcome) => debug!("Previous instance stopped: {outcome:?}"),
            Err(StopError::NoPidfile(_)) => debug!("No previous instance to stop"),
            Err(err) => return Err(err.into()),
        }

        Ok(self.start(descriptor, extra_args)?)
    }

    /// Reports whether the pidfile names a live process.
    pub fn status(&self) -> StatusReport {
        StatusReport::collect(&self.pid_file, self.signaller.as_ref())
    }
}
