//! Service descriptors: the dependency check and command line for each runtime.
use std::{
    env,
    ffi::{OsStr, OsString},
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
    config::{LaunchConfig, Runtime, ServiceManifest},
    constants::{JAR_DIR_NAME, JAR_SUFFIX, JAVA_EXECUTABLE, JAVA_HOME_VAR},
    error::DependencyError,
};

/// Describes how to verify and launch a particular kind of service.
pub trait ServiceDescriptor {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    /// Verifies that everything the command needs is available.
    ///
    /// Called once before [`ServiceDescriptor::build_command`]; implementations may
    /// cache what they resolve here.
    fn check_dependencies(&mut self, config: &LaunchConfig) -> Result<(), DependencyError>;

    /// Returns the argv to execute, with `extra_args` appended verbatim.
    fn build_command(&self, config: &LaunchConfig, extra_args: &[String]) -> Vec<String>;
}

/// Builds the descriptor selected by the manifest, or a plain [`JavaService`] when
/// there is no manifest. `runtime` overrides the manifest's choice.
pub fn from_manifest(
    manifest: Option<&ServiceManifest>,
    runtime: Option<Runtime>,
) -> Box<dyn ServiceDescriptor> {
    let default_manifest = ServiceManifest::default();
    let manifest = manifest.unwrap_or(&default_manifest);

    match runtime.unwrap_or(manifest.runtime) {
        Runtime::Java => {
            let mut service = JavaService::from_env().with_args(manifest.args.clone());
            if let Some(jar) = &manifest.jar {
                service = service.with_jar(jar);
            }
            Box::new(service)
        }
        Runtime::Command => Box::new(
            CommandService::new(manifest.command.clone()).with_args(manifest.args.clone()),
        ),
    }
}

/// Runs a self-contained jar with `java -jar`.
#[derive(Debug, Clone)]
pub struct JavaService {
    java_home: Option<PathBuf>,
    search_path: Option<OsString>,
    jar_override: Option<PathBuf>,
    default_args: Vec<String>,
    java_command: PathBuf,
    jar_file: Option<PathBuf>,
}

impl JavaService {
    /// Captures `JAVA_HOME` and `PATH` from the process environment.
    pub fn from_env() -> Self {
        let java_home = env::var_os(JAVA_HOME_VAR)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        Self::with_env(java_home, env::var_os("PATH"))
    }

    /// Creates a service with an explicit `JAVA_HOME` and `PATH`.
    pub fn with_env(java_home: Option<PathBuf>, search_path: Option<OsString>) -> Self {
        Self {
            java_home,
            search_path,
            jar_override: None,
            default_args: Vec::new(),
            java_command: PathBuf::from(JAVA_EXECUTABLE),
            jar_file: None,
        }
    }

    /// Uses `jar` instead of searching the install directory. Relative paths are
    /// resolved against the install directory.
    pub fn with_jar(mut self, jar: impl Into<PathBuf>) -> Self {
        self.jar_override = Some(jar.into());
        self
    }

    /// Arguments placed between the jar and the forwarded arguments.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.default_args = args;
        self
    }

    /// The java launcher resolved by the dependency check.
    pub fn java_command(&self) -> &Path {
        &self.java_command
    }

    /// The jar resolved by the dependency check.
    pub fn jar_file(&self) -> Option<&Path> {
        self.jar_file.as_deref()
    }

    fn locate_java(&self) -> Result<PathBuf, DependencyError> {
        if let Some(home) = &self.java_home {
            debug!("JAVA_HOME is set to {}", home.display());
            let candidate = home.join("bin").join(JAVA_EXECUTABLE);
            if !candidate.is_file() {
                return Err(DependencyError::JavaHomeInvalid(candidate));
            }
            return Ok(candidate);
        }

        warn!("JAVA_HOME isn't set. The system might not have a working JVM installed.");
        let found = find_in_path(JAVA_EXECUTABLE, self.search_path.as_deref())
            .ok_or(DependencyError::JavaNotFound)?;
        debug!("Found java executable at {}", found.display());
        Ok(found)
    }

    fn locate_jar(&self, install_dir: &Path) -> Result<PathBuf, DependencyError> {
        if let Some(jar) = &self.jar_override {
            let candidate = install_dir.join(jar);
            if candidate.is_file() {
                return Ok(candidate);
            }
            return Err(DependencyError::JarNotFound(candidate));
        }

        let jar_dir = install_dir.join(JAR_DIR_NAME);
        let entries = fs::read_dir(&jar_dir)
            .map_err(|_| DependencyError::JarNotFound(jar_dir.clone()))?;

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .and_then(OsStr::to_str)
                        .is_some_and(|name| name.ends_with(JAR_SUFFIX))
            })
            .collect();
        candidates.sort();

        candidates
            .into_iter()
            .next()
            .ok_or(DependencyError::JarNotFound(jar_dir))
    }
}

impl ServiceDescriptor for JavaService {
    fn name(&self) -> &str {
        "java"
    }

    fn check_dependencies(&mut self, config: &LaunchConfig) -> Result<(), DependencyError> {
        debug!("Checking dependencies");
        self.java_command = self.locate_java()?;
        debug!("Java executable is {}", self.java_command.display());

        let jar = self.locate_jar(&config.install_dir)?;
        debug!("Using jar file: {}", jar.display());
        self.jar_file = Some(jar);
        Ok(())
    }

    fn build_command(&self, _config: &LaunchConfig, extra_args: &[String]) -> Vec<String> {
        let mut command = vec![self.java_command.to_string_lossy().into_owned()];
        command.push("-jar".to_string());
        if let Some(jar) = &self.jar_file {
            command.push(jar.to_string_lossy().into_owned());
        }
        command.extend(self.default_args.iter().cloned());
        command.extend(extra_args.iter().cloned());
        command
    }
}

/// Runs an explicit command line.
#[derive(Debug, Clone)]
pub struct CommandService {
    argv: Vec<String>,
    default_args: Vec<String>,
    search_path: Option<OsString>,
    program: Option<PathBuf>,
}

impl CommandService {
    /// Creates a service running `argv`, searching the process `PATH` for the program.
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            default_args: Vec::new(),
            search_path: env::var_os("PATH"),
            program: None,
        }
    }

    /// Replaces the `PATH` used to locate a bare program name.
    pub fn with_search_path(mut self, search_path: Option<OsString>) -> Self {
        self.search_path = search_path;
        self
    }

    /// Arguments placed between the command and the forwarded arguments.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.default_args = args;
        self
    }
}

impl ServiceDescriptor for CommandService {
    fn name(&self) -> &str {
        "command"
    }

    fn check_dependencies(&mut self, config: &LaunchConfig) -> Result<(), DependencyError> {
        let program = self.argv.first().ok_or(DependencyError::EmptyCommand)?;

        let resolved = if program.contains('/') {
            // Relative paths name files shipped in the install directory.
            let candidate = config.install_dir.join(program);
            is_executable(&candidate).then_some(candidate)
        } else {
            find_in_path(program, self.search_path.as_deref())
        };

        let resolved =
            resolved.ok_or_else(|| DependencyError::ExecutableNotFound(program.clone()))?;
        debug!("Resolved '{program}' to {}", resolved.display());
        self.program = Some(resolved);
        Ok(())
    }

    fn build_command(&self, _config: &LaunchConfig, extra_args: &[String]) -> Vec<String> {
        let mut command = Vec::with_capacity(
            self.argv.len() + self.default_args.len() + extra_args.len(),
        );
        match (&self.program, self.argv.first()) {
            (Some(program), _) => command.push(program.to_string_lossy().into_owned()),
            (None, Some(program)) => command.push(program.clone()),
            (None, None) => {}
        }
        command.extend(self.argv.iter().skip(1).cloned());
        command.extend(self.default_args.iter().cloned());
        command.extend(extra_args.iter().cloned());
        command
    }
}

fn find_in_path(program: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    let search_path = search_path?;
    env::split_paths(search_path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
