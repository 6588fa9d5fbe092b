//! Internal logging system for the Vista engine
//!
//! - Customizable logger via the [`Logger`] trait
//! - Severity levels (Trace, Debug, Info, Warn, Error) with a global minimum level
//! - Colored console output by default
//! - File and line information for ERROR logs
//! - `engine_err!` / `engine_bail!` helpers that log and build an [`Error`](crate::error::Error)

use colored::*;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Logger trait for custom logging implementations
///
/// # Example
///
/// ```no_run
/// use vista_engine::vista::log::{Logger, LogEntry};
///
/// struct FileLogger {
///     file: std::fs::File,
/// }
///
/// impl Logger for FileLogger {
///     fn log(&self, entry: &LogEntry) {
///         // Write to file...
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    /// Log an entry
    fn log(&self, entry: &LogEntry);
}

/// Log entry containing all information about a log message
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Severity level
    pub severity: LogSeverity,

    /// Timestamp when the log was created
    pub timestamp: SystemTime,

    /// Source module (e.g., "vista::Renderer", "vista::vulkan")
    pub source: String,

    /// Log message
    pub message: String,

    /// Source file (only for ERROR logs)
    pub file: Option<&'static str>,

    /// Source line (only for ERROR logs)
    pub line: Option<u32>,
}

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    /// Very verbose debug information
    Trace,

    /// Development/debugging information
    Debug,

    /// Important informational messages
    Info,

    /// Potential issues
    Warn,

    /// Critical issues, logged with file:line details
    Error,
}

impl LogSeverity {
    /// Fixed-width label used in console lines
    pub fn label(self) -> &'static str {
        match self {
            LogSeverity::Trace => "TRACE",
            LogSeverity::Debug => "DEBUG",
            LogSeverity::Info => "INFO ",
            LogSeverity::Warn => "WARN ",
            LogSeverity::Error => "ERROR",
        }
    }
}

impl LogEntry {
    /// `file:line` when the entry carries a location
    pub fn location(&self) -> Option<String> {
        Some(format!("{}:{}", self.file?, self.line?))
    }

    fn timestamp_text(&self) -> String {
        let datetime: DateTime<Local> = self.timestamp.into();
        datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
    }
}

fn compose(timestamp: &str, severity: impl std::fmt::Display, source: impl std::fmt::Display, entry: &LogEntry) -> String {
    let mut line = format!("[{}] [{}] [{}] {}", timestamp, severity, source, entry.message);
    if let Some(location) = entry.location() {
        line.push_str(&format!(" ({})", location));
    }
    line
}

/// Console logger
///
/// Lines read `[timestamp] [SEVERITY] [source] message`, with ` (file:line)`
/// appended for entries that carry a location.
pub struct DefaultLogger;

impl DefaultLogger {
    /// Render an entry without colors
    pub fn format_plain(entry: &LogEntry) -> String {
        compose(&entry.timestamp_text(), entry.severity.label(), &entry.source, entry)
    }
}

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        let label = entry.severity.label();
        let severity = match entry.severity {
            LogSeverity::Trace => label.bright_black(),
            LogSeverity::Debug => label.cyan(),
            LogSeverity::Info => label.green(),
            LogSeverity::Warn => label.yellow(),
            LogSeverity::Error => label.red().bold(),
        };
        println!("{}", compose(&entry.timestamp_text(), severity, entry.source.bright_blue(), entry));
    }
}

// ===== LOGGING MACROS =====

#[doc(hidden)]
#[macro_export]
macro_rules! __engine_log {
    ($severity:ident, $source:expr, $($arg:tt)*) => {
        $crate::vista::Engine::log($crate::vista::log::LogSeverity::$severity, $source, format!($($arg)*))
    };
}

/// Log a TRACE message
///
/// ```no_run
/// vista_engine::engine_trace!("vista::Renderer", "Recording slot {}", 0);
/// ```
#[macro_export]
macro_rules! engine_trace {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Trace, $source, $($arg)*) };
}

#[macro_export]
macro_rules! engine_debug {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Debug, $source, $($arg)*) };
}

/// Log an INFO message
///
/// ```no_run
/// vista_engine::engine_info!("vista::Renderer", "Chain rebuilt at {}x{}", 800, 600);
/// ```
#[macro_export]
macro_rules! engine_info {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Info, $source, $($arg)*) };
}

#[macro_export]
macro_rules! engine_warn {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Warn, $source, $($arg)*) };
}

/// Log an ERROR message; the entry records the calling `file:line`
#[macro_export]
macro_rules! engine_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::vista::Engine::log_detailed(
            $crate::vista::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!(),
        )
    };
}

/// Log an ERROR message and evaluate to an `Error` carrying the same text
///
/// The variant defaults to `BackendError`; any single-`String` variant can be named.
///
/// ```no_run
/// use vista_engine::engine_err;
/// let err = engine_err!("vista::vulkan", "vkCreateFence failed: {}", -1);
/// let err = engine_err!("vista::vulkan", ShaderLoad, "bad SPIR-V magic");
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $variant:ident, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::vista::Error::$variant(message)
    }};
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::vista::Error::BackendError(message)
    }};
}

/// Log an ERROR message and return it as `Err` from the enclosing function
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $variant:ident, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $variant, $($arg)*))
    };
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
