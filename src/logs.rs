use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    sync::{Arc, Mutex, PoisonError},
};

use tracing::{debug, info, warn};

/// Operator-facing channel receiving replayed process output.
pub trait DiagnosticSink {
    /// Emits one line of output captured in the file named `source`.
    fn emit(&self, source: &str, line: &str);
}

/// Forwards replayed lines to the `tracing` subscriber at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, source: &str, line: &str) {
        info!("<{source}>: {line}");
    }
}

/// Collects replayed lines in memory, formatted as `<source>: line`.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every line emitted so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, source: &str, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("<{source}>: {line}"));
    }
}

/// Replays captured output files into a [`DiagnosticSink`].
///
/// Only used on failure paths, to show why a launch failed.
pub struct LogCapture<'a> {
    sink: &'a dyn DiagnosticSink,
}

impl<'a> LogCapture<'a> {
    /// Creates a capture writing to `sink`.
    pub fn new(sink: &'a dyn DiagnosticSink) -> Self {
        Self { sink }
    }

    /// Streams every line of `path` to the sink, prefixed with the file's base name.
    ///
    /// Returns the number of lines replayed. A missing file replays nothing; read
    /// errors are logged rather than returned so they never mask the launch failure
    /// being diagnosed.
    pub fn dump(&self, path: &Path) -> usize {
        debug!("Dumping {} from process", path.display());
        if !path.is_file() {
            return 0;
        }

        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                warn!("Unable to open {} for replay: {err}", path.display());
                return 0;
            }
        };

        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let mut replayed = 0;
        for chunk in BufReader::new(file).split(b'\n') {
            match chunk {
                Ok(bytes) => {
                    let line = String::from_utf8_lossy(&bytes);
                    self.sink.emit(&source, line.trim_end_matches('\r'));
                    replayed += 1;
                }
                Err(err) => {
                    warn!("Stopped replaying {} after read error: {err}", path.display());
                    break;
                }
            }
        }

        replayed
    }
}
