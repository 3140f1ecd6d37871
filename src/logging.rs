//! Structured logging for resource assessment runs
//!
//! Entries carry the subsystem that produced them, an optional station or
//! variable identifier, and a severity. Console output is terse unless
//! timestamps are requested; a log file always gets the full entry.
//!
//! Nothing is printed until `init_logger` has been called.

use chrono::Utc;
use serde::Deserialize;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(label)
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level {:?}", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Subsystems
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// USGS NWIS requests and saved responses
    Usgs,
    /// Delft3D-FM model output
    D3d,
    Resource,
    Graphics,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            DataSource::Usgs => "USGS",
            DataSource::D3d => "D3D",
            DataSource::Resource => "RES",
            DataSource::Graphics => "GFX",
            DataSource::System => "SYS",
        };
        f.write_str(tag)
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Gauge offline for the window, discontinued, or a code rejected up front
    Expected,
    /// Service degradation or a changed response format
    Unexpected,
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureType::Expected => "EXPECTED",
            FailureType::Unexpected => "UNEXPECTED",
            FailureType::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Logger
// ---------------------------------------------------------------------------

static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    min_level: LogLevel,
    log_file: Option<PathBuf>,
    /// Print full timestamped entries on the console instead of the short form
    console_timestamps: bool,
}

impl Logger {
    pub fn new(min_level: LogLevel, log_file: Option<PathBuf>, console_timestamps: bool) -> Self {
        Logger { min_level, log_file, console_timestamps }
    }

    /// Installs this logger as the process-wide one, replacing any earlier one.
    pub fn install(self) {
        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(self);
        }
    }

    fn format_entry(level: LogLevel, source: DataSource, context: Option<&str>, message: &str) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        match context {
            Some(ctx) => format!("{} {} {} [{}]: {}", timestamp, level, source, ctx, message),
            None => format!("{} {} {}: {}", timestamp, level, source, message),
        }
    }

    fn short_form(level: LogLevel, source: DataSource, context: Option<&str>, message: &str) -> String {
        let origin = match context {
            Some(ctx) => format!("{} [{}]", source, ctx),
            None => source.to_string(),
        };
        match level {
            LogLevel::Error => format!("   ✗ {}: {}", origin, message),
            LogLevel::Warning => format!("   ⚠ {}: {}", origin, message),
            LogLevel::Info => format!("   {}", message),
            LogLevel::Debug => format!("   [DEBUG] {}: {}", origin, message),
        }
    }

    fn log(&self, level: LogLevel, source: DataSource, context: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let entry = Self::format_entry(level, source, context, message);
        let console = if self.console_timestamps {
            entry.clone()
        } else {
            Self::short_form(level, source, context, message)
        };
        if level >= LogLevel::Warning {
            eprintln!("{}", console);
        } else {
            println!("{}", console);
        }

        if let Some(path) = &self.log_file {
            if let Err(e) = append_line(path, &entry) {
                eprintln!("Failed to write to log file {}: {}", path.display(), e);
            }
        }
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

pub fn init_logger(min_level: LogLevel, log_file: Option<&Path>, console_timestamps: bool) {
    Logger::new(min_level, log_file.map(Path::to_path_buf), console_timestamps).install();
}

fn dispatch(level: LogLevel, source: DataSource, context: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, source, context, message);
        }
    }
}

pub fn info(source: DataSource, context: Option<&str>, message: &str) {
    dispatch(LogLevel::Info, source, context, message);
}

pub fn warn(source: DataSource, context: Option<&str>, message: &str) {
    dispatch(LogLevel::Warning, source, context, message);
}

pub fn error(source: DataSource, context: Option<&str>, message: &str) {
    dispatch(LogLevel::Error, source, context, message);
}

pub fn debug(source: DataSource, context: Option<&str>, message: &str) {
    dispatch(LogLevel::Debug, source, context, message);
}

// ---------------------------------------------------------------------------
// USGS Failures
// ---------------------------------------------------------------------------

/// Classify a USGS failure from its error message
pub fn classify_usgs_failure(_station: &str, error_message: &str) -> FailureType {
    const EXPECTED: [&str; 4] = [
        // Seasonal or discontinued gauges return empty windows
        "No data available",
        "No timeSeries entries",
        "Invalid station",
        "Invalid parameter",
    ];
    const UNEXPECTED: [&str; 2] = ["HTTP error", "Parse error"];

    if EXPECTED.iter().any(|m| error_message.contains(m)) {
        FailureType::Expected
    } else if UNEXPECTED.iter().any(|m| error_message.contains(m)) {
        FailureType::Unexpected
    } else {
        FailureType::Unknown
    }
}

/// Log a USGS failure at the level its classification calls for
pub fn log_usgs_failure(station: &str, operation: &str, err: &dyn std::error::Error) {
    let text = err.to_string();
    let failure_type = classify_usgs_failure(station, &text);
    let message = format!("{} failed [{}]: {}", operation, failure_type, text);

    let level = match failure_type {
        FailureType::Expected => LogLevel::Debug,
        FailureType::Unexpected => LogLevel::Error,
        FailureType::Unknown => LogLevel::Warning,
    };
    dispatch(level, DataSource::Usgs, Some(station), &message);
}

/// Log how many of the series in a response could be read
pub fn log_parse_summary(source: DataSource, context: Option<&str>, total: usize, kept: usize) {
    let message = format!("{}/{} series read, {} skipped", kept, total, total - kept.min(total));
    if kept == total {
        debug(source, context, &message);
    } else if kept == 0 {
        error(source, context, &message);
    } else {
        warn(source, context, &message);
    }
}
