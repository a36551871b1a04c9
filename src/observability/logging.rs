//! Structured file logging.
//!
//! # Responsibilities
//! - Format one timestamped, leveled line per call
//! - Tag lines with the ambient correlation token
//! - Append to one file per UTC day
//!
//! # Design Decisions
//! - Formatting and file open happen before taking the lock
//! - One process-wide lock per target file, so separate loggers sharing a
//!   directory still never interleave
//! - No rotation or retention; a day's file grows as needed

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use dashmap::DashMap;
use thiserror::Error;

use crate::config::LoggingConfig;
use crate::observability::correlation::{self, CorrelationToken};

static APPEND_LOCKS: OnceLock<DashMap<PathBuf, Arc<Mutex<()>>>> = OnceLock::new();

fn append_lock(path: PathBuf) -> Arc<Mutex<()>> {
    APPEND_LOCKS
        .get_or_init(DashMap::new)
        .entry(path)
        .or_default()
        .clone()
}

/// Errors raised by [`FileLogger`].
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The configured directory is empty or not a directory.
    #[error("invalid log directory '{}'", .0.display())]
    InvalidDirectory(PathBuf),

    #[error("log I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Severity of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One log line before it hits the disk.
#[derive(Debug, Clone)]
pub struct LogRecord<'a> {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub run: Option<CorrelationToken>,
    pub message: &'a str,
}

impl fmt::Display for LogRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] ",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.level
        )?;
        if let Some(run) = &self.run {
            write!(f, "[run={}] ", run)?;
        }
        f.write_str(self.message)
    }
}

/// Appends records to `<directory>/<YYYYMMDD>.log`.
#[derive(Debug, Clone)]
pub struct FileLogger {
    directory: PathBuf,
    /// Canonical form of `directory`. Files are opened and locked through it,
    /// so a later change of working directory cannot split the two.
    root: PathBuf,
}

impl FileLogger {
    /// Create the logger, creating `directory` and its ancestors if needed.
    pub fn new(directory: impl AsRef<Path>) -> Result<Self, LoggingError> {
        let directory = directory.as_ref();
        if directory.as_os_str().is_empty() || directory.is_file() {
            return Err(LoggingError::InvalidDirectory(directory.to_path_buf()));
        }

        fs::create_dir_all(directory)?;
        let root = fs::canonicalize(directory)?;

        tracing::debug!(directory = %directory.display(), "File logger ready");
        Ok(Self {
            directory: directory.to_path_buf(),
            root,
        })
    }

    pub fn from_config(config: &LoggingConfig) -> Result<Self, LoggingError> {
        Self::new(&config.directory)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Absolute path of the file receiving records dated `date`.
    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.root.join(Self::file_name(date))
    }

    fn file_name(date: NaiveDate) -> String {
        format!("{}.log", date.format("%Y%m%d"))
    }

    pub fn info(&self, message: impl AsRef<str>) -> Result<(), LoggingError> {
        self.log(Level::Info, message)
    }

    pub fn error(&self, message: impl AsRef<str>) -> Result<(), LoggingError> {
        self.log(Level::Error, message)
    }

    /// Write one record at `level`, tagged with the current correlation token.
    ///
    /// The message is written verbatim; embedded newlines are not escaped.
    pub fn log(&self, level: Level, message: impl AsRef<str>) -> Result<(), LoggingError> {
        let record = LogRecord {
            timestamp: Utc::now(),
            level,
            run: correlation::get(),
            message: message.as_ref(),
        };
        let mut line = record.to_string();
        line.push('\n');

        let path = self.file_for(record.timestamp.date_naive());
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        let lock = append_lock(path);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}
