//! Common error types for the OPA exporter
//!
//! Module-specific errors are defined next to the code that raises them and
//! re-exported here together with the top-level [`OpaError`].

use thiserror::Error;

pub use crate::fetch::FetchError;
pub use crate::logging::LoggerError;
pub use crate::ports::http::TransportError;
pub use crate::scheduler::SchedulerError;
pub use crate::source::ReadingError;

/// Top-level error type for OPA exporter operations
///
/// Wraps the domain-specific errors and converts from them via `From`, so
/// `?` works across module boundaries.
#[derive(Debug, Error)]
pub enum OpaError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Request could not be issued
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Transport-level failures
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Scheduler lifecycle errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Logger errors
    #[error("Logger error: {0}")]
    Logger(#[from] LoggerError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file is not valid INI
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// A required section or key is absent
    #[error("Missing configuration key '{key}' in section [{section}]")]
    MissingKey {
        /// Section name
        section: String,
        /// Key name
        key: String,
    },

    /// A value is present but unusable
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub(crate) fn missing(section: &str, key: &str) -> Self {
        ConfigError::MissingKey {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}
