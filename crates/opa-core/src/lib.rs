//! OPA Core - Domain logic for the PurpleAir air-quality exporter
//!
//! This crate contains configuration, sensor sources, the upload sink, the poll
//! loop and the HTTP port, following the Hexagonal Architecture pattern. The
//! concrete HTTP client lives in `opa-adapters`.

pub mod api_key;
pub mod config;
pub mod error;
pub mod exporter;
pub mod fetch;
pub mod logging;
pub mod poller;
pub mod ports;
pub mod scheduler;
pub mod source;

#[cfg(test)]
mod testing;

// Re-export primary types for convenient access
pub use api_key::{mask_secret, SecretApiKey, API_KEY_HEADER};
pub use config::{
    load_config, load_config_from_path, ConfigMapping, Configuration, ExporterSettings,
    DEFAULT_CONFIG_FILE, DEFAULT_INTERVAL_SECONDS, DEFAULT_UPLOAD_URL,
};
pub use error::{ConfigError, OpaError};
pub use exporter::{ExportOutcome, UploadSink};
pub use fetch::{fetch, FetchError, FetchOutcome, FetchRequest, Response, FETCH_TIMEOUT};
pub use logging::{init_logger, LogLevel, LoggerConfig, LoggerError, LoggerGuard};
pub use poller::{CycleReport, Poller, SourceReport, SourceStatus};
pub use ports::{HttpRequest, HttpTransport, RawResponse, TransportError};
pub use scheduler::{PollScheduler, SchedulerError};
pub use source::{configured_sources, fetch_reading, ReadingError, SensorReading, SensorSource};
