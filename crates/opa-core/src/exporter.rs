//! Upload of sensor readings to the aggregation sink
//!
//! Each reading is POSTed as `{"opa": <reading>, "config": <config dump>}` and
//! the sink's answer is classified into an [`ExportOutcome`].

use crate::config::{ConfigMapping, Configuration, ExporterSettings};
use crate::fetch::{fetch, FetchError, FetchOutcome, FetchRequest};
use crate::ports::http::{HttpTransport, TransportError};
use crate::source::SensorReading;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

/// How the sink answered an upload
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    /// Status 200 with `"status": "ok"`
    Accepted(Value),
    /// Any status other than 200
    Rejected {
        /// Status returned
        status: u16,
        /// Body returned
        body: String,
    },
    /// The sink could not be reached
    Unreachable(TransportError),
    /// Status 200 but the body is not JSON
    InvalidResponse(String),
    /// Valid JSON whose `status` is not `"ok"`
    ServerFailure(Value),
}

impl ExportOutcome {
    /// Returns true if the sink accepted the reading
    pub fn is_accepted(&self) -> bool {
        matches!(self, ExportOutcome::Accepted(_))
    }

    /// Classifies a fetch outcome
    pub fn from_fetch(outcome: FetchOutcome) -> Self {
        let response = match outcome {
            FetchOutcome::TransportFailed(e) => return ExportOutcome::Unreachable(e),
            FetchOutcome::Completed(r) | FetchOutcome::HttpError(r) => r,
        };

        if response.status_code != 200 {
            return ExportOutcome::Rejected {
                status: response.status_code,
                body: response.text,
            };
        }

        match response.json() {
            None => ExportOutcome::InvalidResponse(response.text),
            Some(body) if body.get("status").and_then(Value::as_str) == Some("ok") => {
                ExportOutcome::Accepted(body)
            }
            Some(body) => ExportOutcome::ServerFailure(body),
        }
    }
}

/// The aggregation endpoint together with the config dump it receives
#[derive(Debug, Clone)]
pub struct UploadSink {
    url: String,
    config_dump: ConfigMapping,
}

impl UploadSink {
    /// Creates a sink posting to `url` with the given dump
    pub fn new(url: impl Into<String>, config_dump: ConfigMapping) -> Self {
        Self {
            url: url.into(),
            config_dump,
        }
    }

    /// Builds the sink described by the configuration
    pub fn from_config(config: &Configuration, settings: &ExporterSettings) -> Self {
        Self::new(
            settings.upload_url.clone(),
            config.export_mapping(settings.forward_api_key),
        )
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Configuration dump attached to each upload
    pub fn config_dump(&self) -> &ConfigMapping {
        &self.config_dump
    }

    /// Body sent for a reading
    pub fn payload(&self, reading: &SensorReading) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert("opa".to_string(), reading.as_value().clone());
        payload.insert("config".to_string(), json!(self.config_dump));
        payload
    }

    /// Uploads one reading and logs how the sink answered
    ///
    /// # Errors
    /// Only if the request cannot be issued at all; every answer from the
    /// sink, including failures, is an `Ok(ExportOutcome)`.
    pub async fn export<T>(
        &self,
        transport: &T,
        reading: &SensorReading,
    ) -> Result<ExportOutcome, FetchError>
    where
        T: HttpTransport + ?Sized,
    {
        let request = FetchRequest::post(&self.url).with_data(self.payload(reading));
        let outcome = ExportOutcome::from_fetch(fetch(transport, request).await?);
        self.log_outcome(&outcome);
        Ok(outcome)
    }

    fn log_outcome(&self, outcome: &ExportOutcome) {
        match outcome {
            ExportOutcome::Accepted(body) => {
                info!("Upload accepted by {}\n{}", self.url, pretty(body));
            }
            ExportOutcome::Rejected { status, body } => {
                warn!(
                    body = %body,
                    "Sorry, failed to upload to the aggregation server at {}: http error {}",
                    self.url,
                    status
                );
            }
            ExportOutcome::Unreachable(e) => {
                warn!(
                    "Sorry, failed to upload to the aggregation server at {}: {}",
                    self.url, e
                );
            }
            ExportOutcome::InvalidResponse(text) => {
                warn!("Invalid response (not JSON): {}", text);
            }
            ExportOutcome::ServerFailure(body) => {
                warn!(
                    "Sorry, failed to upload to the aggregation server at {}: response {}",
                    self.url,
                    pretty(body)
                );
            }
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
