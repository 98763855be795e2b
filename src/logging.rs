//! Build-level reporting
//!
//! A bundling run reports every transport dispatch and stage transition
//! through a [`BuildLogger`] handed to it at construction. Whether a run is
//! silent is decided by which logger is injected, not by global state.

use parking_lot::Mutex;
use std::fmt;

/// Severity of a build log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Sink for build-level log lines
pub trait BuildLogger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

/// Forwards build log lines to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl BuildLogger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "pagebundle", "{message}"),
            LogLevel::Info => tracing::info!(target: "pagebundle", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "pagebundle", "{message}"),
            LogLevel::Error => tracing::error!(target: "pagebundle", "{message}"),
        }
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentLogger;

impl BuildLogger for SilentLogger {
    fn log(&self, _level: LogLevel, _message: &str) {}
}

/// Keeps log lines in memory so callers can inspect what a run reported
#[derive(Debug, Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLogger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded lines in arrival order
    #[must_use]
    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().clone()
    }

    /// True if any recorded line contains `needle`
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|(_, line)| line.contains(needle))
    }

    /// Number of lines recorded at `level`
    #[must_use]
    pub fn count(&self, level: LogLevel) -> usize {
        self.lines.lock().iter().filter(|(l, _)| *l == level).count()
    }
}

impl BuildLogger for MemoryLogger {
    fn log(&self, level: LogLevel, message: &str) {
        self.lines.lock().push((level, message.to_string()));
    }
}
