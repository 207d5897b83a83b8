//! OPA CLI - PurpleAir air-quality exporter
//!
//! Main entry point for the `opa` binary.

mod app;
mod commands;

use anyhow::Result;
use app::{graceful_shutdown, initialize, InitOptions};
use clap::{Parser, Subcommand};
use opa_core::{LogLevel, LoggerConfig, DEFAULT_CONFIG_FILE};
use std::path::PathBuf;
use std::process::ExitCode;

/// Forwards PurpleAir sensor readings to an aggregation server
#[derive(Debug, Parser)]
#[command(name = "opa", version, about)]
struct Cli {
    /// Path of the INI configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Also write daily-rotated log files into this directory (~/.opa/logs
    /// when given without a value)
    #[arg(long, global = true, num_args = 0..=1, value_name = "DIR")]
    log_dir: Option<Option<PathBuf>>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll the configured sensors until Ctrl+C (default)
    Run {
        /// Seconds between poll cycles, overriding [exporter] interval_seconds
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Run a single poll cycle and print a summary
    Once,
    /// Show the configuration with the API key masked
    Config,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Run { interval: None });

    let options = match &command {
        Command::Config => InitOptions::command(&cli.config),
        Command::Run { .. } | Command::Once => InitOptions::service(&cli.config)
            .with_log_level(cli.log_level)
            .with_log_dir(resolve_log_dir(cli.log_dir)),
    };
    let ctx = initialize(options)?;

    match command {
        Command::Run { interval } => {
            commands::run::run(&ctx, interval).await?;
            Ok(exit_code(graceful_shutdown("interrupted by user")))
        }
        Command::Once => {
            let all_uploaded = commands::once::run(&ctx).await?;
            if all_uploaded {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(exit_code(graceful_shutdown("error: some readings were not uploaded")))
            }
        }
        Command::Config => {
            commands::config::run(&ctx)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// A bare `--log-dir` selects the default log directory
fn resolve_log_dir(arg: Option<Option<PathBuf>>) -> Option<PathBuf> {
    arg.map(|dir| dir.unwrap_or_else(LoggerConfig::default_log_dir))
}

fn exit_code(code: i32) -> ExitCode {
    if code == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
