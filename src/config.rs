//! Launch configuration and the optional service manifest.
use regex::{Captures, Regex};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::LazyLock,
    time::Duration,
};
use strum_macros::{AsRefStr, EnumString};
use tracing::debug;

use crate::constants::{
    DEFAULT_GRACE_WINDOW, DEFAULT_MAX_POLLS, DEFAULT_POLL_INTERVAL, LOG_DIR_NAME,
    MANIFEST_FILE_NAME, PID_FILE_NAME, RUN_DIR_NAME, STDERR_FILE_NAME,
    STDOUT_FILE_NAME,
};
use crate::error::ConfigError;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?").expect("valid env var pattern")
});

/// Blocking-wait parameters for launch and shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// How long a new process must survive before launch counts as successful.
    pub grace_window: Duration,
    /// Delay between liveness checks after the polite termination signal.
    pub poll_interval: Duration,
    /// Number of liveness checks before escalating to a forceful kill.
    pub max_polls: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            grace_window: DEFAULT_GRACE_WINDOW,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }
}

/// Paths used by one invocation, all derived from the working and install directories.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Directory the service runs in; owns `logs/` and `run/`.
    pub working_dir: PathBuf,
    /// Directory the service is installed in (jar files, manifest).
    pub install_dir: PathBuf,
    /// Directory receiving captured output.
    pub log_dir: PathBuf,
    /// Directory receiving the pidfile.
    pub run_dir: PathBuf,
    /// Captured standard output of the service.
    pub stdout_file: PathBuf,
    /// Captured standard error of the service.
    pub stderr_file: PathBuf,
    /// The pidfile.
    pub pid_file: PathBuf,
    /// Grace window and shutdown polling parameters.
    pub timing: Timing,
}

impl LaunchConfig {
    /// Derives the full layout from the working and install directories.
    pub fn new(working_dir: impl Into<PathBuf>, install_dir: impl Into<PathBuf>) -> Self {
        let working_dir = working_dir.into();
        let log_dir = working_dir.join(LOG_DIR_NAME);
        let run_dir = working_dir.join(RUN_DIR_NAME);

        Self {
            install_dir: install_dir.into(),
            stdout_file: log_dir.join(STDOUT_FILE_NAME),
            stderr_file: log_dir.join(STDERR_FILE_NAME),
            pid_file: run_dir.join(PID_FILE_NAME),
            log_dir,
            run_dir,
            working_dir,
            timing: Timing::default(),
        }
    }

    /// Replaces the timing parameters.
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Checks that the working and install directories exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.working_dir.is_dir() {
            return Err(ConfigError::MissingDirectory {
                kind: "Working",
                path: self.working_dir.clone(),
            });
        }

        if !self.install_dir.is_dir() {
            return Err(ConfigError::MissingDirectory {
                kind: "Install",
                path: self.install_dir.clone(),
            });
        }

        Ok(())
    }
}

/// Kind of service described by the manifest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Runtime {
    /// A self-contained jar launched with `java -jar`.
    #[default]
    Java,
    /// An explicit command line.
    Command,
}

/// Optional `pidvisor.yaml` in the install directory.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceManifest {
    /// Which descriptor builds the command line.
    #[serde(default)]
    pub runtime: Runtime,
    /// Command line for the `command` runtime.
    #[serde(default)]
    pub command: Vec<String>,
    /// Arguments placed before the ones forwarded from the CLI.
    #[serde(default)]
    pub args: Vec<String>,
    /// Jar file to run instead of searching the install directory.
    pub jar: Option<String>,
    /// Grace window override, e.g. `"3s"` or `"500ms"`.
    pub grace_period: Option<String>,
    /// How long to wait after the polite signal before killing, e.g. `"2m"`.
    pub stop_timeout: Option<String>,
}

impl ServiceManifest {
    /// Applies the manifest's duration overrides on top of `base`.
    pub fn timing(&self, base: Timing) -> Result<Timing, ConfigError> {
        let mut timing = base;

        if let Some(raw) = self.grace_period.as_deref() {
            timing.grace_window = parse_duration(raw)?;
        }

        if let Some(raw) = self.stop_timeout.as_deref() {
            let timeout = parse_duration(raw)?.as_millis();
            let interval = timing.poll_interval.as_millis().max(1);
            timing.max_polls = u32::try_from(timeout.div_ceil(interval)).unwrap_or(u32::MAX);
        }

        Ok(timing)
    }
}

/// Loads `<install_dir>/pidvisor.yaml`, expanding `${VAR}` references.
///
/// Returns `Ok(None)` when the install directory has no manifest.
pub fn load_manifest(install_dir: &Path) -> Result<Option<ServiceManifest>, ConfigError> {
    let path = install_dir.join(MANIFEST_FILE_NAME);
    if !path.is_file() {
        debug!("No manifest at {}", path.display());
        return Ok(None);
    }

    let content = fs::read_to_string(&path).map_err(|source| ConfigError::ManifestRead {
        path: path.clone(),
        source,
    })?;
    let expanded = expand_env_vars(&content)?;

    let manifest: ServiceManifest = serde_yaml::from_str(&expanded)
        .map_err(|source| ConfigError::ManifestParse { path: path.clone(), source })?;

    if manifest.runtime == Runtime::Command && manifest.command.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "{} selects the command runtime but has no command",
            path.display()
        )));
    }

    debug!("Loaded manifest {} ({} runtime)", path.display(), manifest.runtime.as_ref());
    Ok(Some(manifest))
}

/// Expands `$VAR` and `${VAR}` references from the process environment.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    expand_env_vars_with(input, |name| env::var(name).ok())
}

fn expand_env_vars_with<F>(input: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing: Option<String> = None;
    let expanded = ENV_VAR_PATTERN.replace_all(input, |caps: &Captures| {
        let name = &caps[1];
        lookup(name).unwrap_or_else(|| {
            missing.get_or_insert_with(|| name.to_string());
            String::new()
        })
    });

    match missing {
        Some(name) => Err(ConfigError::MissingEnvVar(name)),
        None => Ok(expanded.into_owned()),
    }
}

/// Parses a manifest duration such as `"500ms"`, `"3s"`, `"2m"`, or `"1h"`.
///
/// A bare number is seconds. Zero is rejected.
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(raw.to_string());

    let value = raw.trim();
    let unit_start = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(unit_start);
    let amount: u64 = digits.parse().map_err(|_| invalid())?;

    let duration = match unit.trim_start() {
        "ms" => Duration::from_millis(amount),
        "" | "s" => Duration::from_secs(amount),
        "m" => Duration::from_secs(amount.saturating_mul(60)),
        "h" => Duration::from_secs(amount.saturating_mul(3600)),
        _ => return Err(invalid()),
    };

    if duration.is_zero() {
        return Err(invalid());
    }
    Ok(duration)
}
