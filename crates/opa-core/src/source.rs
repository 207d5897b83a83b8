//! PurpleAir sensor sources
//!
//! A source knows how to build the request for its reading; the reading itself
//! is passed along untouched.

use crate::api_key::{SecretApiKey, API_KEY_HEADER};
use crate::config::{Configuration, REMOTE_SECTION};
use crate::error::ConfigError;
use crate::fetch::{fetch, FetchError, FetchOutcome, FetchRequest};
use crate::ports::http::{HttpTransport, TransportError};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Base URL of the PurpleAir cloud sensor endpoint
pub const REMOTE_API_BASE: &str = "https://api.purpleair.com/v1/sensors/";

/// Number of body characters quoted when a reading is not JSON
const SNIPPET_LEN: usize = 50;

/// Where a reading comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorSource {
    /// PurpleAir cloud API, authenticated by API key
    Remote {
        /// Key sent in the `X-API-Key` header
        api_key: SecretApiKey,
        /// Sensor index on the cloud API
        sensor_index: String,
    },
    /// Sensor on the local network exposing `/json`
    Local {
        /// Host or IP address of the sensor
        ip: String,
    },
}

impl SensorSource {
    /// URL the reading is fetched from
    pub fn url(&self) -> String {
        match self {
            SensorSource::Remote { sensor_index, .. } => {
                format!("{}{}", REMOTE_API_BASE, sensor_index)
            }
            SensorSource::Local { ip } => format!("http://{}/json", ip),
        }
    }

    /// Human-readable name for log lines
    pub fn label(&self) -> &'static str {
        match self {
            SensorSource::Remote { .. } => "remote PurpleAir API",
            SensorSource::Local { .. } => "local PurpleAir sensor",
        }
    }

    /// The GET request for this source's reading
    pub fn request(&self) -> FetchRequest {
        let request = FetchRequest::new(self.url());
        match self {
            SensorSource::Remote { api_key, .. } => {
                request.with_header(API_KEY_HEADER, api_key.expose())
            }
            SensorSource::Local { .. } => request,
        }
    }
}

impl fmt::Display for SensorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.label(), self.url())
    }
}

/// Builds the source list: remote first, then local
///
/// An incomplete or blank source is a startup error here, rather than a fetch
/// failure repeated every cycle.
///
/// # Errors
/// - `ConfigError::MissingKey` if `api_key` is set without `sensor_index`
/// - `ConfigError::InvalidValue` for a blank key, index or IP
pub fn configured_sources(config: &Configuration) -> Result<Vec<SensorSource>, ConfigError> {
    let mut sources = Vec::new();

    if config.has_remote() {
        let api_key = SecretApiKey::new(config.remote_api_key()?).ok_or_else(|| {
            ConfigError::InvalidValue(format!("[{}] api_key is empty", REMOTE_SECTION))
        })?;
        let sensor_index = non_blank(config.remote_sensor_index()?, "sensor_index")?;
        sources.push(SensorSource::Remote {
            api_key,
            sensor_index,
        });
    }

    if config.has_local() {
        let ip = non_blank(config.local_ip()?, "ip")?;
        sources.push(SensorSource::Local { ip });
    }

    debug!(count = sources.len(), "Configured sensor sources");
    Ok(sources)
}

fn non_blank(value: &str, key: &str) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::InvalidValue(format!("{} is empty", key)))
    } else {
        Ok(value.trim().to_string())
    }
}

/// An opaque sensor reading
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading(Value);

impl SensorReading {
    /// Wraps a decoded JSON value
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Borrows the JSON value
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Unwraps the JSON value
    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Why a reading could not be obtained
#[derive(Debug, Error)]
pub enum ReadingError {
    /// The sensor answered with a status other than 200
    #[error("http error {status}")]
    Http {
        /// Status returned
        status: u16,
        /// Body returned
        body: String,
    },

    /// No usable response
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// Status 200 but the body is not JSON
    #[error("Invalid JSON ({snippet}...)")]
    InvalidJson {
        /// Leading characters of the body
        snippet: String,
    },

    /// The request could not be issued
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Fetches one reading
///
/// Succeeds only on status 200 with a JSON body. Failures are logged here and
/// returned so the caller can skip the source for this cycle.
pub async fn fetch_reading<T>(
    transport: &T,
    source: &SensorSource,
) -> Result<SensorReading, ReadingError>
where
    T: HttpTransport + ?Sized,
{
    let url = source.url();
    let outcome = fetch(transport, source.request()).await.map_err(|e| {
        warn!("Sorry, failed to access the {} at {}: {}", source.label(), url, e);
        ReadingError::from(e)
    })?;

    let response = match outcome {
        FetchOutcome::Completed(response) if response.status_code == 200 => response,
        FetchOutcome::Completed(response) | FetchOutcome::HttpError(response) => {
            warn!(
                body = %response.text,
                "Sorry, failed to access the {} at {}: http error {}",
                source.label(),
                url,
                response.status_code
            );
            return Err(ReadingError::Http {
                status: response.status_code,
                body: response.text,
            });
        }
        FetchOutcome::TransportFailed(e) => {
            warn!(
                "Sorry, failed to access the {} at {}: {}",
                source.label(),
                url,
                e
            );
            return Err(ReadingError::Transport(e));
        }
    };

    match response.json() {
        Some(value) => Ok(SensorReading::new(value)),
        None => {
            let snippet: String = response.text.chars().take(SNIPPET_LEN).collect();
            warn!(
                "Sorry, failed to access the {} at {}: Invalid JSON ({}...)",
                source.label(),
                url,
                snippet
            );
            Err(ReadingError::InvalidJson { snippet })
        }
    }
}
