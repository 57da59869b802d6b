use std::{env, error::Error, path::PathBuf, process};

use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use pidvisor::{
    cli::{Cli, Commands, parse_args},
    config::{LaunchConfig, Timing, load_manifest},
    constants::{EXIT_INVALID_CONFIG, EXIT_SUCCESS},
    descriptor::from_manifest,
    error::ConfigError,
    supervisor::Supervisor,
};

fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args();
    init_logging(&args);

    let code = run(args)?;
    process::exit(code);
}

fn init_logging(args: &Cli) {
    let filter = match args.log_filter() {
        Some(level) => EnvFilter::default().add_directive(level.into()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    // Stdout is reserved for `status` output.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(args: Cli) -> Result<i32, Box<dyn Error>> {
    let working_dir = match args.working_directory {
        Some(dir) => dir,
        None => {
            let cwd = env::current_dir()?;
            warn!("Using {} as working directory", cwd.display());
            cwd
        }
    };
    let install_dir = match args.install_directory {
        Some(dir) => dir,
        None => default_install_dir()?,
    };
    debug!("Install directory is {}", install_dir.display());

    let config = LaunchConfig::new(working_dir, install_dir);
    if let Err(err) = config.validate() {
        error!("{err}");
        return Ok(EXIT_INVALID_CONFIG);
    }

    let manifest = match load_manifest(&config.install_dir) {
        Ok(manifest) => manifest,
        Err(err) => return Ok(config_failure(err)),
    };
    let timing = match &manifest {
        Some(manifest) => match manifest.timing(Timing::default()) {
            Ok(timing) => timing,
            Err(err) => return Ok(config_failure(err)),
        },
        None => Timing::default(),
    };

    let supervisor = Supervisor::new(config.with_timing(timing));

    let code = match args.command {
        Commands::Start { args: extra } => {
            let mut descriptor = from_manifest(manifest.as_ref(), args.runtime);
            match supervisor.start(descriptor.as_mut(), &extra) {
                Ok(record) => {
                    info!("Started with pid {}", record.pid());
                    EXIT_SUCCESS
                }
                Err(err) => err.exit_code(),
            }
        }
        Commands::Stop => match supervisor.stop() {
            Ok(outcome) => {
                debug!("Stop finished: {outcome:?}");
                EXIT_SUCCESS
            }
            Err(err) => {
                error!("{err}");
                err.exit_code()
            }
        },
        Commands::Restart { args: extra } => {
            let mut descriptor = from_manifest(manifest.as_ref(), args.runtime);
            match supervisor.restart(descriptor.as_mut(), &extra) {
                Ok(record) => {
                    info!("Restarted with pid {}", record.pid());
                    EXIT_SUCCESS
                }
                Err(err) => {
                    error!("{err}");
                    err.exit_code()
                }
            }
        }
        Commands::Status { json } => {
            let report = supervisor.status();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.render());
            }
            report.exit_code()
        }
    };

    Ok(code)
}

/// The directory above the one holding this executable, as in an `<install>/bin/`
/// layout. Falls back to the current directory.
fn default_install_dir() -> Result<PathBuf, Box<dyn Error>> {
    let from_exe = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent()?.parent().map(PathBuf::from));

    match from_exe {
        Some(dir) => Ok(dir),
        None => Ok(env::current_dir()?),
    }
}

fn config_failure(err: ConfigError) -> i32 {
    error!("{err}");
    EXIT_INVALID_CONFIG
}
