//! Configuration display command
//!
//! Handles `opa config` to show the loaded file, the sources it yields and the
//! exporter settings. The API key is masked.

use crate::app::AppContext;
use anyhow::{Context, Result};
use opa_core::{configured_sources, SensorSource};

/// Show the effective configuration
pub fn run(ctx: &AppContext) -> Result<()> {
    for line in render(ctx)? {
        println!("{}", line);
    }
    Ok(())
}

/// Lines printed by `opa config`
pub fn render(ctx: &AppContext) -> Result<Vec<String>> {
    let mut lines = vec![
        "OPA Configuration".to_string(),
        "=================".to_string(),
        format!("File: {}", ctx.config_path().display()),
        String::new(),
    ];

    let mapping = ctx.config().masked_mapping();
    if mapping.is_empty() {
        lines.push("(empty)".to_string());
    }
    for (section, entries) in &mapping {
        lines.push(format!("[{}]", section));
        for (key, value) in entries {
            lines.push(format!("{} = {}", key, value));
        }
        lines.push(String::new());
    }

    lines.push("Sources".to_string());
    lines.push("-------".to_string());
    let sources = configured_sources(ctx.config()).context("Invalid sensor configuration")?;
    if sources.is_empty() {
        lines.push("  none (nothing will be polled)".to_string());
    }
    for source in &sources {
        match source {
            SensorSource::Remote { api_key, .. } => {
                lines.push(format!("  {} (key {})", source, api_key.masked()));
            }
            SensorSource::Local { .. } => lines.push(format!("  {}", source)),
        }
    }

    let settings = &ctx.settings;
    lines.push(String::new());
    lines.push("Exporter".to_string());
    lines.push("--------".to_string());
    lines.push(format!("  Upload URL: {}", settings.upload_url));
    lines.push(format!(
        "  Poll interval: {} seconds",
        settings.interval.as_secs()
    ));
    lines.push(format!(
        "  Forward API key: {}",
        if settings.forward_api_key { "yes" } else { "no" }
    ));

    Ok(lines)
}
