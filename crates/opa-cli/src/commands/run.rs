//! Polling loop command
//!
//! Handles `opa run` (and `opa` without a subcommand): polls every configured
//! source at the exporter interval until Ctrl+C.

use crate::app::AppContext;
use anyhow::{Context, Result};
use opa_adapters::ReqwestTransport;
use opa_core::{ExporterSettings, PollScheduler};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Applies a `--interval` override on top of the configured settings
pub fn effective_settings(
    settings: &ExporterSettings,
    interval_override: Option<u64>,
) -> Result<ExporterSettings> {
    let mut settings = settings.clone();
    if let Some(seconds) = interval_override {
        settings.interval = Duration::from_secs(seconds);
    }
    settings.validate().context("Invalid --interval")?;
    Ok(settings)
}

/// Run the polling loop in the foreground
///
/// The first cycle starts immediately. Ctrl+C stops the loop once the cycle
/// in progress has finished.
pub async fn run(ctx: &AppContext, interval_override: Option<u64>) -> Result<()> {
    let settings = effective_settings(&ctx.settings, interval_override)?;

    let transport = Arc::new(ReqwestTransport::new().context("Failed to create HTTP client")?);
    let poller = ctx.poller(transport, &settings)?;

    for source in poller.sources() {
        info!("Polling {}", source);
    }
    info!("Uploading readings to {}", poller.sink().url());

    let scheduler = PollScheduler::new(Arc::new(poller), settings.interval);
    scheduler
        .start()
        .await
        .context("Failed to start polling")?;

    info!("Polling started, press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    info!("Received Ctrl+C");
    scheduler.stop().await.context("Failed to stop polling")?;
    info!(
        cycles = scheduler.cycles_completed(),
        "Polling stopped"
    );

    Ok(())
}
