//! One poll cycle: fetch every configured source, export each reading

use crate::config::{Configuration, ExporterSettings};
use crate::error::ConfigError;
use crate::exporter::{ExportOutcome, UploadSink};
use crate::fetch::FetchError;
use crate::ports::http::HttpTransport;
use crate::source::{configured_sources, fetch_reading, ReadingError, SensorSource};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to one source during a cycle
#[derive(Debug)]
pub enum SourceStatus {
    /// A reading was obtained and handed to the sink
    Exported(ExportOutcome),
    /// No reading this cycle
    FetchFailed(ReadingError),
    /// A reading was obtained but the upload could not be issued
    ExportAborted(FetchError),
}

impl SourceStatus {
    /// True only when the sink accepted the reading
    pub fn is_success(&self) -> bool {
        matches!(self, SourceStatus::Exported(outcome) if outcome.is_accepted())
    }
}

/// Per-source entry of a [`CycleReport`]
#[derive(Debug)]
pub struct SourceReport {
    /// Description of the source (label and URL)
    pub source: String,
    /// Result for that source
    pub status: SourceStatus,
}

/// Summary of one poll cycle
#[derive(Debug)]
pub struct CycleReport {
    /// When the cycle began
    pub started_at: DateTime<Utc>,
    /// When the last source finished
    pub finished_at: DateTime<Utc>,
    /// One entry per configured source, in polling order
    pub sources: Vec<SourceReport>,
}

impl CycleReport {
    /// Number of sources whose reading did not reach the sink
    pub fn failures(&self) -> usize {
        self.sources.iter().filter(|s| !s.status.is_success()).count()
    }

    /// True when every source was exported and accepted
    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }

    /// True when no source was configured
    pub fn is_idle(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Runs poll cycles over a fixed list of sources
pub struct Poller<T>
where
    T: HttpTransport,
{
    transport: Arc<T>,
    sources: Vec<SensorSource>,
    sink: UploadSink,
}

impl<T> Poller<T>
where
    T: HttpTransport,
{
    /// Creates a poller from its parts
    pub fn new(transport: Arc<T>, sources: Vec<SensorSource>, sink: UploadSink) -> Self {
        Self {
            transport,
            sources,
            sink,
        }
    }

    /// Builds the source list and sink from the configuration
    ///
    /// Warns when the remote API key will be forwarded to the sink.
    ///
    /// # Errors
    /// Returns `ConfigError` if a configured source is incomplete
    pub fn from_config(
        transport: Arc<T>,
        config: &Configuration,
        settings: &ExporterSettings,
    ) -> Result<Self, ConfigError> {
        let sources = configured_sources(config)?;
        let sink = UploadSink::from_config(config, settings);

        if config.has_remote() && settings.forward_api_key {
            warn!(
                "The PurpleAir API key is included in every upload to {}; \
                 set forward_api_key = false in [exporter] to withhold it",
                sink.url()
            );
        }

        Ok(Self::new(transport, sources, sink))
    }

    /// Configured sources in polling order
    pub fn sources(&self) -> &[SensorSource] {
        &self.sources
    }

    /// Destination of the readings
    pub fn sink(&self) -> &UploadSink {
        &self.sink
    }

    /// Runs one cycle
    ///
    /// Sources are polled strictly in sequence. A failing source is logged
    /// and skipped; the cycle always visits every source.
    pub async fn poll_once(&self) -> CycleReport {
        let started_at = Utc::now();
        let mut reports = Vec::with_capacity(self.sources.len());

        if self.sources.is_empty() {
            debug!("No sensor source configured, nothing to poll");
        }

        for source in &self.sources {
            let status = match fetch_reading(self.transport.as_ref(), source).await {
                Ok(reading) => match self.sink.export(self.transport.as_ref(), &reading).await {
                    Ok(outcome) => SourceStatus::Exported(outcome),
                    Err(e) => {
                        warn!("Upload to {} could not be issued: {}", self.sink.url(), e);
                        SourceStatus::ExportAborted(e)
                    }
                },
                Err(e) => SourceStatus::FetchFailed(e),
            };

            reports.push(SourceReport {
                source: source.to_string(),
                status,
            });
        }

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            sources: reports,
        };

        info!(
            sources = report.sources.len(),
            failures = report.failures(),
            "Poll cycle finished"
        );

        report
    }
}
