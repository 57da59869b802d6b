//! Single-line pidfile persistence.
//!
//! The pidfile's existence is the only signal that an instance is running. It is
//! advisory: nothing stops a process from exiting while its pidfile remains.
use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, ErrorKind, Write},
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::error::PidFileError;

/// Reads, writes, and removes the pidfile at a fixed path.
#[derive(Debug, Clone)]
pub struct PidFileStore {
    path: PathBuf,
}

impl PidFileStore {
    /// Creates a store for the pidfile at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the pidfile path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if the pidfile is a regular file.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Writes `pid` as decimal text, replacing any previous content.
    pub fn write(&self, pid: u32) -> Result<(), PidFileError> {
        fs::write(&self.path, pid.to_string()).map_err(|source| self.io_error(source))
    }

    /// Creates the pidfile exclusively and returns a lock owning it.
    ///
    /// Fails with [`PidFileError::AlreadyExists`] when another invocation created the
    /// file first; the existing file is left untouched in that case.
    pub fn claim(&self) -> Result<PidFileLock, PidFileError> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .map_err(|source| {
                if source.kind() == ErrorKind::AlreadyExists {
                    PidFileError::AlreadyExists(self.path.clone())
                } else {
                    self.io_error(source)
                }
            })?;

        debug!("Claimed pidfile {}", self.path.display());
        Ok(PidFileLock {
            file,
            path: self.path.clone(),
        })
    }

    /// Writes `pid` only if no pidfile exists yet.
    pub fn create(&self, pid: u32) -> Result<(), PidFileError> {
        let mut lock = self.claim()?;
        if let Err(err) = lock.record(pid) {
            let _ = lock.release();
            return Err(err);
        }
        Ok(())
    }

    /// Reads the process id from the first line of the pidfile.
    pub fn read(&self) -> Result<u32, PidFileError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(PidFileError::NotFound(self.path.clone()));
            }
            Err(err) => return Err(self.io_error(err)),
        };

        let mut first_line = String::new();
        BufReader::new(file)
            .read_line(&mut first_line)
            .map_err(|source| self.io_error(source))?;

        let trimmed = first_line.trim();
        if trimmed.is_empty() {
            return Err(PidFileError::Empty(self.path.clone()));
        }

        // Zero and values beyond `pid_t` would make kill(2) target process groups.
        match trimmed.parse::<u32>() {
            Ok(pid) if pid > 0 && i32::try_from(pid).is_ok() => Ok(pid),
            _ => Err(PidFileError::Invalid {
                path: self.path.clone(),
                content: trimmed.to_string(),
            }),
        }
    }

    /// Deletes the pidfile. Succeeds if it is already absent.
    pub fn remove(&self) -> Result<(), PidFileError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed pidfile {}", self.path.display());
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }

    fn io_error(&self, source: std::io::Error) -> PidFileError {
        PidFileError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// A pidfile created by this invocation.
///
/// Only the holder of a lock may delete the file it names. Dropping the lock keeps
/// the file on disk.
#[derive(Debug)]
pub struct PidFileLock {
    file: File,
    path: PathBuf,
}

impl PidFileLock {
    /// Location of the claimed pidfile.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `pid` into the claimed file.
    pub fn record(&mut self, pid: u32) -> Result<(), PidFileError> {
        self.file
            .write_all(pid.to_string().as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|source| PidFileError::Io {
                path: self.path.clone(),
                source,
            })?;

        debug!("Recorded pid {pid} in {}", self.path.display());
        Ok(())
    }

    /// Deletes the claimed pidfile.
    pub fn release(self) -> Result<(), PidFileError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Released pidfile {}", self.path.display());
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PidFileError::Io {
                path: self.path,
                source,
            }),
        }
    }
}
