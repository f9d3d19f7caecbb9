//! Logging activation.
//!
//! [`activate`] reads the packaged `/styx.logging.properties` resource and
//! installs a process-wide `tracing` subscriber configured from it. It is
//! meant to be called once, first thing in `main`.
//!
//! The installed [`LogHandle`] owns the output writer. Process-exit cleanup
//! calls [`LogHandle::shutdown`] to flush and close it; while a daemon's
//! stop or completion callback is running, teardown is suppressed so those
//! callbacks can still log.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, Subscriber};
use tracing_subscriber::fmt::writer::MakeWriter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{LogConfig, LogFormat};
use crate::error::{Error, Result};
use crate::resources::Resources;

/// Name of the packaged logging resource.
pub const DEFAULT_LOGGING_RESOURCE: &str = "/styx.logging.properties";

static ACTIVE: OnceLock<LogHandle> = OnceLock::new();
static ACTIVATION: Mutex<()> = Mutex::new(());

/// Activate logging from the packaged default resource.
///
/// # Errors
///
/// Returns an `Error::Init` if the resource is missing, cannot be read or
/// parsed, or if a global subscriber is already installed. Nothing is
/// installed in that case.
pub fn activate() -> Result<LogHandle> {
    activate_resource(DEFAULT_LOGGING_RESOURCE)
}

/// Activate logging from the packaged resource `name`.
///
/// # Errors
///
/// See [`activate`].
pub fn activate_resource(name: &str) -> Result<LogHandle> {
    activate_from(&Resources::packaged(), name)
}

/// Activate logging from resource `name` in `resources`.
///
/// # Errors
///
/// See [`activate`].
pub fn activate_from(resources: &Resources, name: &str) -> Result<LogHandle> {
    let config = LogConfig::from_resource(resources, name).map_err(|e| {
        if e.is_init_error() {
            e
        } else {
            Error::init_with_source(format!("Invalid logging configuration in {name}"), e)
        }
    })?;
    activate_with(&config)
}

/// Activate logging from an already loaded configuration.
///
/// # Errors
///
/// Returns an `Error::Init` if the output cannot be opened, a filter
/// directive is invalid, or logging is already active.
pub fn activate_with(config: &LogConfig) -> Result<LogHandle> {
    let _activation = ACTIVATION.lock();
    if ACTIVE.get().is_some() {
        return Err(Error::init("Logging is already active"));
    }

    let (subscriber, handle) = build(config)?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::init_with_source("Failed to install global subscriber", e))?;
    let _ = ACTIVE.set(handle.clone());

    debug!(level = ?config.level, format = ?config.format, "Logging activated");
    Ok(handle)
}

/// The handle installed by a successful activation.
#[must_use]
pub fn handle() -> Option<&'static LogHandle> {
    ACTIVE.get()
}

/// Suppress teardown of the active logging output until the guard drops.
///
/// Returns `None` if logging was never activated through this module.
#[must_use]
pub fn suppress_teardown() -> Option<TeardownGuard> {
    ACTIVE.get().map(LogHandle::suppress_teardown)
}

/// Flush and close the active logging output. See [`LogHandle::shutdown`].
pub fn shutdown() -> bool {
    ACTIVE.get().is_some_and(LogHandle::shutdown)
}

/// Build a subscriber for `config` without installing it.
///
/// # Errors
///
/// Returns an `Error::Init` if the log file cannot be opened, a filter
/// directive is invalid, or JSON output is requested without the
/// `json-logs` feature.
pub fn build(config: &LogConfig) -> Result<(Box<dyn Subscriber + Send + Sync>, LogHandle)> {
    let writer = match &config.file {
        Some(path) => LogWriter::file(path, config.max_file_size, config.max_files)
            .map_err(|e| {
                Error::init_with_source(format!("Failed to open log file {}", path.display()), e)
            })?,
        None => LogWriter::stderr(),
    };
    let subscriber = build_with_writer(config, writer.clone())?;
    Ok((subscriber, LogHandle::new(writer)))
}

fn build_with_writer(
    config: &LogConfig,
    writer: LogWriter,
) -> Result<Box<dyn Subscriber + Send + Sync>> {
    let level: tracing::Level = config.level.into();
    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in config.extra_directives() {
        let parsed = directive.parse().map_err(|e| {
            Error::init_with_source(format!("Invalid filter directive {directive:?}"), e)
        })?;
        filter = filter.add_directive(parsed);
    }

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(config.target)
        .with_thread_ids(config.thread_ids)
        .with_ansi(config.ansi)
        .with_writer(writer);

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.format {
        LogFormat::Compact => Box::new(builder.compact().finish()),
        LogFormat::Full => Box::new(builder.finish()),
        #[cfg(feature = "json-logs")]
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        #[cfg(not(feature = "json-logs"))]
        LogFormat::Json => {
            return Err(Error::init(
                "JSON log format requires the json-logs feature",
            ))
        }
    };
    Ok(subscriber)
}

/// Owner of an activated logging output.
#[derive(Debug, Clone)]
pub struct LogHandle {
    writer: LogWriter,
    suppressed: Arc<AtomicUsize>,
}

impl LogHandle {
    fn new(writer: LogWriter) -> Self {
        Self {
            writer,
            suppressed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Keep the output open until the returned guard is dropped.
    ///
    /// Guards nest: teardown is allowed again once every guard is gone.
    #[must_use]
    pub fn suppress_teardown(&self) -> TeardownGuard {
        self.suppressed.fetch_add(1, Ordering::AcqRel);
        TeardownGuard {
            suppressed: Arc::clone(&self.suppressed),
        }
    }

    /// Whether a [`TeardownGuard`] is alive.
    #[must_use]
    pub fn is_teardown_suppressed(&self) -> bool {
        self.suppressed.load(Ordering::Acquire) > 0
    }

    /// Flush and close the output.
    ///
    /// Returns `false` without closing while teardown is suppressed. Records
    /// emitted after a successful shutdown are discarded.
    pub fn shutdown(&self) -> bool {
        if self.is_teardown_suppressed() {
            debug!("Logging teardown suppressed");
            return false;
        }
        self.writer.close();
        true
    }

    /// Whether the output has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.writer.is_closed()
    }
}

/// Keeps logging teardown suppressed while alive.
#[derive(Debug)]
pub struct TeardownGuard {
    suppressed: Arc<AtomicUsize>,
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        self.suppressed.fetch_sub(1, Ordering::AcqRel);
    }
}

enum Target {
    Stderr,
    File(RotatingFile),
    #[cfg(test)]
    Buffer(Arc<Mutex<Vec<u8>>>),
}

struct WriterInner {
    target: Mutex<Target>,
    closed: AtomicBool,
}

/// Output of the logging subscriber: stderr or a size-rotated file.
#[derive(Clone)]
pub struct LogWriter {
    inner: Arc<WriterInner>,
}

impl std::fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let target = match &*self.inner.target.lock() {
            Target::Stderr => "stderr".to_string(),
            Target::File(file) => file.path.display().to_string(),
            #[cfg(test)]
            Target::Buffer(_) => "buffer".to_string(),
        };
        f.debug_struct("LogWriter")
            .field("target", &target)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl LogWriter {
    fn with_target(target: Target) -> Self {
        Self {
            inner: Arc::new(WriterInner {
                target: Mutex::new(target),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Write to the process's standard error.
    #[must_use]
    pub fn stderr() -> Self {
        Self::with_target(Target::Stderr)
    }

    /// Append to `path`, rotating once it would exceed `max_size` bytes.
    ///
    /// Up to `max_files` rotated files are kept as `path.1`, `path.2`, ...
    ///
    /// # Errors
    ///
    /// Returns the I/O error if `path` cannot be opened for appending.
    pub fn file<P: Into<PathBuf>>(
        path: P,
        max_size: Option<u64>,
        max_files: Option<u32>,
    ) -> io::Result<Self> {
        RotatingFile::open(path.into(), max_size, max_files).map(|f| Self::with_target(Target::File(f)))
    }

    #[cfg(test)]
    fn buffer(buf: Arc<Mutex<Vec<u8>>>) -> Self {
        Self::with_target(Target::Buffer(buf))
    }

    /// Flush and stop writing. Later writes are discarded.
    pub fn close(&self) {
        let mut target = self.inner.target.lock();
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = target.flush();
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl Target {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stderr => io::stderr().write(buf),
            Self::File(file) => file.write(buf),
            #[cfg(test)]
            Self::Buffer(out) => {
                out.lock().extend_from_slice(buf);
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stderr => io::stderr().flush(),
            Self::File(file) => file.file.flush(),
            #[cfg(test)]
            Self::Buffer(_) => Ok(()),
        }
    }
}

/// Per-record writer handed out by [`LogWriter`].
pub struct LogWriterGuard {
    inner: Arc<WriterInner>,
}

impl Write for LogWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut target = self.inner.target.lock();
        if self.inner.closed.load(Ordering::Acquire) {
            return Ok(buf.len());
        }
        target.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut target = self.inner.target.lock();
        if self.inner.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        target.flush()
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriterGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct RotatingFile {
    file: File,
    path: PathBuf,
    max_size: u64,
    max_files: u32,
    size: u64,
}

impl RotatingFile {
    fn open(path: PathBuf, max_size: Option<u64>, max_files: Option<u32>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            file,
            path,
            max_size: max_size.unwrap_or(u64::MAX),
            max_files: max_files.unwrap_or(0),
            size,
        })
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.size > 0 && self.size.saturating_add(buf.len() as u64) > self.max_size {
            self.rotate()?;
        }
        let written = self.file.write(buf)?;
        self.size = self.size.saturating_add(written as u64);
        Ok(written)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.max_files == 0 {
            // Nothing to keep: start over in place.
            self.file.set_len(0)?;
            self.size = 0;
            return Ok(());
        }

        for idx in (1..=self.max_files).rev() {
            let from = rotated_path(&self.path, idx - 1);
            let to = rotated_path(&self.path, idx);
            if from.exists() {
                let _ = std::fs::remove_file(&to);
                std::fs::rename(&from, &to)?;
            }
        }
        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.size = 0;
        Ok(())
    }
}

fn rotated_path(path: &Path, idx: u32) -> PathBuf {
    if idx == 0 {
        return path.to_path_buf();
    }
    PathBuf::from(format!("{}.{idx}", path.display()))
}
