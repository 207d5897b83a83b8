//! Application initialization and lifecycle management
//!
//! Provides centralized initialization sequence and fatal error handling
//! for the OPA CLI application.

use anyhow::{Context, Result};
use opa_core::{
    init_logger, load_config_from_path, Configuration, ExporterSettings, HttpTransport, LogLevel,
    LoggerConfig, LoggerGuard, Poller,
};
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// Application context holding initialized components
pub struct AppContext {
    /// Parsed configuration file
    pub config: Arc<Configuration>,
    /// Settings derived from the `[exporter]` section
    pub settings: ExporterSettings,
    config_path: PathBuf,
    /// Logger guard (keeps logger alive)
    #[allow(dead_code)]
    logger_guard: Option<LoggerGuard>,
}

impl AppContext {
    /// Returns reference to the configuration
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Returns the path the configuration was read from
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Builds the poller for this configuration on the given transport
    ///
    /// # Errors
    /// Fails if a configured source is incomplete
    pub fn poller<T: HttpTransport>(
        &self,
        transport: Arc<T>,
        settings: &ExporterSettings,
    ) -> Result<Poller<T>> {
        Poller::from_config(transport, &self.config, settings)
            .with_context(|| format!("Invalid sensor configuration in {:?}", self.config_path))
    }
}

/// Application initialization options
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Path of the INI configuration file
    pub config_path: PathBuf,
    /// Whether to initialize the logger
    pub init_logger: bool,
    /// Log level override
    pub log_level: Option<LogLevel>,
    /// Directory for the rotated log file, if any
    pub log_dir: Option<PathBuf>,
}

impl InitOptions {
    /// Creates options for the polling commands (logging to stdout)
    pub fn service(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            init_logger: true,
            log_level: Some(LogLevel::Info),
            log_dir: None,
        }
    }

    /// Creates options for inspection commands (no logger)
    pub fn command(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            init_logger: false,
            log_level: None,
            log_dir: None,
        }
    }

    /// Overrides the log level
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Adds file logging into `log_dir`
    pub fn with_log_dir(mut self, log_dir: Option<PathBuf>) -> Self {
        self.log_dir = log_dir;
        self
    }
}

/// Initializes the OPA application
///
/// This function performs the following initialization sequence:
/// 1. Initialize logging (if requested)
/// 2. Load configuration from the INI file
/// 3. Read the exporter settings
/// 4. Set up panic hook for fatal error handling
///
/// # Arguments
/// * `options` - Initialization options
///
/// # Returns
/// * `Ok(AppContext)` - Initialized application context
/// * `Err` - Initialization failed
pub fn initialize(options: InitOptions) -> Result<AppContext> {
    // Step 1: Initialize logging
    let logger_guard = if options.init_logger {
        let mut logger_config =
            LoggerConfig::new().with_level(options.log_level.unwrap_or(LogLevel::Info));
        if let Some(log_dir) = &options.log_dir {
            logger_config = logger_config.with_log_dir(log_dir);
        }

        Some(init_logger(logger_config).context("Failed to initialize logger")?)
    } else {
        None
    };

    // Step 2: Load configuration
    let config = load_config_from_path(&options.config_path)
        .with_context(|| format!("Failed to load configuration from {:?}", options.config_path))?;

    // Step 3: Exporter settings
    let settings = config
        .exporter_settings()
        .context("Invalid [exporter] settings")?;

    // Step 4: Set up panic hook for fatal errors
    setup_panic_hook(options.log_dir.clone());

    Ok(AppContext {
        config: Arc::new(config),
        settings,
        config_path: options.config_path,
        logger_guard,
    })
}

/// Sets up a custom panic hook for fatal error handling
///
/// Logs the panic through tracing, prints a short message and then defers to
/// the default hook.
fn setup_panic_hook(log_dir: Option<PathBuf>) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown location".to_string());

        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic payload".to_string()
        };

        error!("FATAL ERROR at {}: {}", location, message);

        eprintln!();
        eprintln!("opa encountered a fatal error and must exit.");
        eprintln!("Location: {}", location);
        eprintln!("Error: {}", message);
        if let Some(dir) = &log_dir {
            eprintln!("Please check the log files in: {}", dir.display());
        }
        eprintln!();

        default_hook(panic_info);
    }));
}

/// Logs the shutdown reason and returns the process exit code
///
/// # Returns
/// Exit code (0 for success, 1 for error)
pub fn graceful_shutdown(reason: &str) -> i32 {
    info!("Initiating graceful shutdown: {}", reason);
    info!("Shutdown complete");

    if reason.contains("error") || reason.contains("fatal") {
        1
    } else {
        0
    }
}
