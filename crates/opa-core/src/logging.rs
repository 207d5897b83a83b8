//! Logging infrastructure for the OPA exporter
//!
//! Progress lines go to stdout; a daily-rotated log file can be added on top.
//! Uses `tracing` for instrumentation and `tracing-subscriber` for formatting.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Default log file name
pub const DEFAULT_LOG_FILE: &str = "opa.log";

/// Crates whose events pass the level filter
const LOG_TARGETS: [&str; 3] = ["opa", "opa_core", "opa_adapters"];

/// Errors that can occur during logger initialization
#[derive(Debug, Error)]
pub enum LoggerError {
    /// Failed to create log directory
    #[error("Failed to create log directory: {0}")]
    DirectoryCreationFailed(String),

    /// Failed to initialize the logger
    #[error("Failed to initialize logger: {0}")]
    InitializationFailed(String),

    /// Logger already initialized
    #[error("Logger has already been initialized")]
    AlreadyInitialized,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Error level - critical failures
    Error,
    /// Warn level - warnings and recoverable issues
    Warn,
    /// Info level - general information (default)
    #[default]
    Info,
    /// Debug level - detailed debugging information
    Debug,
    /// Trace level - very detailed tracing
    Trace,
}

impl LogLevel {
    /// Converts to tracing's LevelFilter
    pub fn to_level_filter(self) -> tracing::level_filters::LevelFilter {
        match self {
            LogLevel::Error => tracing::level_filters::LevelFilter::ERROR,
            LogLevel::Warn => tracing::level_filters::LevelFilter::WARN,
            LogLevel::Info => tracing::level_filters::LevelFilter::INFO,
            LogLevel::Debug => tracing::level_filters::LevelFilter::DEBUG,
            LogLevel::Trace => tracing::level_filters::LevelFilter::TRACE,
        }
    }

    /// Builds the `EnvFilter` directive used when `RUST_LOG` is unset
    pub fn filter_directive(self) -> String {
        LOG_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, self))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// Configuration for the exporter logger
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Directory for log files; file logging is off when unset
    pub log_dir: Option<PathBuf>,
    /// Log level filter
    pub level: LogLevel,
    /// Whether to log to stdout
    pub log_to_stdout: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            level: LogLevel::Info,
            log_to_stdout: true,
        }
    }
}

impl LoggerConfig {
    /// Creates a stdout-only LoggerConfig at info level
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the default log directory (`~/.opa/logs`)
    pub fn default_log_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".opa")
            .join("logs")
    }

    /// Sets the log level
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Enables or disables logging to stdout
    pub fn with_stdout(mut self, enabled: bool) -> Self {
        self.log_to_stdout = enabled;
        self
    }

    /// Enables file logging into the given directory
    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(log_dir.into());
        self
    }

    /// Returns the log directory path, if file logging is enabled
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }

    /// Returns the full path to the log file, if file logging is enabled
    pub fn log_file_path(&self) -> Option<PathBuf> {
        self.log_dir.as_ref().map(|dir| dir.join(DEFAULT_LOG_FILE))
    }
}

/// Guard that keeps the file writer alive
///
/// When dropped, buffered log lines are flushed.
pub struct LoggerGuard {
    _guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Initializes the global logger with the given configuration
///
/// # Returns
/// A `LoggerGuard` that must be kept alive for the duration of the program.
///
/// # Errors
/// Returns `LoggerError` if the log directory cannot be created or a global
/// subscriber is already installed
///
/// # Example
/// ```ignore
/// let _guard = init_logger(LoggerConfig::new().with_level(LogLevel::Debug))?;
/// tracing::info!("Logger initialized");
/// ```
pub fn init_logger(config: LoggerConfig) -> Result<LoggerGuard, LoggerError> {
    use std::fs;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let (file_layer, guard) = match &config.log_dir {
        Some(log_dir) => {
            if !log_dir.exists() {
                fs::create_dir_all(log_dir).map_err(|e| {
                    LoggerError::DirectoryCreationFailed(format!("{}: {}", log_dir.display(), e))
                })?;
            }

            let file_appender = tracing_appender::rolling::daily(log_dir, DEFAULT_LOG_FILE);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stdout_layer = config.log_to_stdout.then(|| {
        fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(false)
    });

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.filter_directive()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| LoggerError::InitializationFailed(e.to_string()))?;

    tracing::debug!(
        log_dir = ?config.log_dir,
        level = %config.level,
        "Logger initialized"
    );

    Ok(LoggerGuard { _guard: guard })
}

/// Initializes a simple logger for testing purposes
#[cfg(test)]
pub fn init_test_logger(level: LogLevel) {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::new(level.filter_directive()))
        .with_test_writer()
        .try_init();
}
