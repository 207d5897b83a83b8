//! Single cycle command
//!
//! Handles `opa once`: polls every configured source one time and prints what
//! happened to each reading.

use crate::app::AppContext;
use anyhow::{Context, Result};
use opa_adapters::ReqwestTransport;
use opa_core::{CycleReport, ExportOutcome, SourceStatus};
use std::sync::Arc;

/// Execute one poll cycle
///
/// # Returns
/// `true` if every source was uploaded and accepted
pub async fn run(ctx: &AppContext) -> Result<bool> {
    let transport = Arc::new(ReqwestTransport::new().context("Failed to create HTTP client")?);
    let poller = ctx.poller(transport, &ctx.settings)?;

    let report = poller.poll_once().await;
    for line in summarize(&report) {
        println!("{}", line);
    }

    Ok(report.is_success())
}

/// Human-readable lines describing a cycle
pub fn summarize(report: &CycleReport) -> Vec<String> {
    let elapsed = report.finished_at - report.started_at;
    let mut lines = vec![format!(
        "Poll cycle at {} ({} ms)",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        elapsed.num_milliseconds()
    )];

    if report.is_idle() {
        lines.push("  No sensor source configured".to_string());
        return lines;
    }

    for entry in &report.sources {
        lines.push(format!("  {}: {}", entry.source, describe(&entry.status)));
    }

    lines.push(format!(
        "{} of {} sources uploaded",
        report.sources.len() - report.failures(),
        report.sources.len()
    ));
    lines
}

fn describe(status: &SourceStatus) -> String {
    match status {
        SourceStatus::Exported(ExportOutcome::Accepted(_)) => "uploaded".to_string(),
        SourceStatus::Exported(ExportOutcome::Rejected { status, .. }) => {
            format!("upload rejected (http {})", status)
        }
        SourceStatus::Exported(ExportOutcome::Unreachable(e)) => {
            format!("sink unreachable ({})", e)
        }
        SourceStatus::Exported(ExportOutcome::InvalidResponse(_)) => {
            "sink answered with invalid JSON".to_string()
        }
        SourceStatus::Exported(ExportOutcome::ServerFailure(body)) => {
            format!("sink reported failure {}", body)
        }
        SourceStatus::FetchFailed(e) => format!("no reading ({})", e),
        SourceStatus::ExportAborted(e) => format!("upload not sent ({})", e),
    }
}
