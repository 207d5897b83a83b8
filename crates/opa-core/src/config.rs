//! Configuration management for the OPA exporter
//!
//! Handles loading of the INI configuration file and the typed accessors the
//! exporter needs on top of it.

use crate::api_key::mask_secret;
use crate::error::ConfigError;
use ini::{Ini, ParseOption};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

/// Default configuration file, resolved against the working directory
pub const DEFAULT_CONFIG_FILE: &str = "opa.ini";

/// Section describing the sensor on the local network
pub const LOCAL_SECTION: &str = "pa_local_api";

/// Section describing the PurpleAir cloud API credentials
pub const REMOTE_SECTION: &str = "pa_remote_api";

/// Optional section tuning the exporter itself
pub const EXPORTER_SECTION: &str = "exporter";

/// Default aggregation endpoint
pub const DEFAULT_UPLOAD_URL: &str = "https://aqicn.org/sensor/upload";

/// Default pause between poll cycles in seconds
pub const DEFAULT_INTERVAL_SECONDS: u64 = 120;

/// Section name to (key to value) dump of a configuration
pub type ConfigMapping = BTreeMap<String, BTreeMap<String, String>>;

/// Loaded configuration file
///
/// Immutable once loaded. Keys are stored lower-cased and values trimmed;
/// section names are kept as written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    sections: ConfigMapping,
}

impl Configuration {
    /// Parses INI content
    ///
    /// Quotes and backslashes are kept verbatim. Keys appearing before the
    /// first section header, a repeated section and a key repeated within a
    /// section are rejected.
    pub fn from_ini_str(content: &str) -> Result<Self, ConfigError> {
        let option = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..ParseOption::default()
        };
        let ini = Ini::load_from_str_opt(content, option)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        let mut sections = ConfigMapping::new();
        for (name, properties) in ini.iter() {
            let Some(name) = name else {
                if let Some((key, _)) = properties.iter().next() {
                    return Err(ConfigError::ParseError(format!(
                        "key '{}' appears before any section header",
                        key
                    )));
                }
                continue;
            };

            let name = name.trim().to_string();
            if sections.contains_key(&name) {
                return Err(ConfigError::ParseError(format!(
                    "section [{}] appears more than once",
                    name
                )));
            }

            let mut entry = BTreeMap::new();
            for (key, value) in properties.iter() {
                let key = key.trim().to_lowercase();
                if entry.contains_key(&key) {
                    return Err(ConfigError::ParseError(format!(
                        "key '{}' appears more than once in section [{}]",
                        key, name
                    )));
                }
                entry.insert(key, value.trim().to_string());
            }
            sections.insert(name, entry);
        }

        Ok(Self { sections })
    }

    /// Returns true when no section was loaded
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Returns true if the section exists
    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    /// Looks up a value without failing
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|values| values.get(&key.to_lowercase()))
            .map(String::as_str)
    }

    /// Looks up a value, failing with `ConfigError::MissingKey` if absent
    pub fn require(&self, section: &str, key: &str) -> Result<&str, ConfigError> {
        self.get(section, key)
            .ok_or_else(|| ConfigError::missing(section, key))
    }

    /// True iff `[pa_local_api]` has an `ip`
    pub fn has_local(&self) -> bool {
        self.get(LOCAL_SECTION, "ip").is_some()
    }

    /// True iff `[pa_remote_api]` has an `api_key`
    pub fn has_remote(&self) -> bool {
        self.get(REMOTE_SECTION, "api_key").is_some()
    }

    /// Address of the local sensor
    pub fn local_ip(&self) -> Result<&str, ConfigError> {
        self.require(LOCAL_SECTION, "ip")
    }

    /// PurpleAir API key. Never log the returned value.
    pub fn remote_api_key(&self) -> Result<&str, ConfigError> {
        self.require(REMOTE_SECTION, "api_key")
    }

    /// Index of the sensor on the PurpleAir cloud API
    pub fn remote_sensor_index(&self) -> Result<&str, ConfigError> {
        self.require(REMOTE_SECTION, "sensor_index")
    }

    /// Full dump of every section, secrets included
    pub fn to_mapping(&self) -> ConfigMapping {
        self.sections.clone()
    }

    /// Dump attached to upload payloads
    ///
    /// With `forward_api_key` unset the remote `api_key` is left out.
    pub fn export_mapping(&self, forward_api_key: bool) -> ConfigMapping {
        let mut mapping = self.to_mapping();
        if !forward_api_key {
            if let Some(remote) = mapping.get_mut(REMOTE_SECTION) {
                remote.remove("api_key");
            }
        }
        mapping
    }

    /// Dump suitable for display, with the remote `api_key` masked
    pub fn masked_mapping(&self) -> ConfigMapping {
        let mut mapping = self.to_mapping();
        if let Some(key) = mapping
            .get_mut(REMOTE_SECTION)
            .and_then(|remote| remote.get_mut("api_key"))
        {
            *key = mask_secret(key);
        }
        mapping
    }

    /// Reads the optional `[exporter]` section, applying defaults
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` for unparsable or out-of-range values
    pub fn exporter_settings(&self) -> Result<ExporterSettings, ConfigError> {
        let mut settings = ExporterSettings::default();

        if let Some(raw) = self.get(EXPORTER_SECTION, "interval_seconds") {
            let seconds: u64 = raw.parse().map_err(|_| {
                ConfigError::InvalidValue(format!(
                    "interval_seconds must be a positive integer, got '{}'",
                    raw
                ))
            })?;
            settings.interval = Duration::from_secs(seconds);
        }

        if let Some(url) = self.get(EXPORTER_SECTION, "upload_url") {
            settings.upload_url = url.to_string();
        }

        if let Some(raw) = self.get(EXPORTER_SECTION, "forward_api_key") {
            settings.forward_api_key = parse_bool(raw).ok_or_else(|| {
                ConfigError::InvalidValue(format!(
                    "forward_api_key must be a boolean, got '{}'",
                    raw
                ))
            })?;
        }

        settings.validate()?;
        Ok(settings)
    }
}

/// Exporter tuning read from the `[exporter]` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterSettings {
    /// Pause between poll cycles
    pub interval: Duration,
    /// Aggregation endpoint receiving the readings
    pub upload_url: String,
    /// Whether the remote API key is included in upload payloads
    pub forward_api_key: bool,
}

impl Default for ExporterSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECONDS),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            forward_api_key: true,
        }
    }
}

impl ExporterSettings {
    /// Validates the settings
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` if:
    /// - `interval` is zero
    /// - `upload_url` is not an http(s) URL
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "interval_seconds must be > 0".to_string(),
            ));
        }

        if !self.upload_url.to_lowercase().starts_with("http") {
            return Err(ConfigError::InvalidValue(format!(
                "upload_url must be an http(s) URL, got '{}'",
                self.upload_url
            )));
        }

        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

/// Loads configuration from the specified path
///
/// A missing file yields an empty configuration; the absence of sections then
/// surfaces through `has_local`/`has_remote`.
///
/// # Returns
/// * `Ok(Configuration)` - Parsed (possibly empty) configuration
/// * `Err(ConfigError)` - Unreadable file or invalid INI
pub fn load_config_from_path(path: &Path) -> Result<Configuration, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(
                "Configuration file {:?} not found, no sensor source configured",
                path
            );
            return Ok(Configuration::default());
        }
        Err(e) => return Err(e.into()),
    };

    let config = Configuration::from_ini_str(&content)?;
    tracing::info!(
        path = %path.display(),
        sections = ?config.sections.keys().collect::<Vec<_>>(),
        "Loaded configuration"
    );
    Ok(config)
}

/// Loads configuration from `opa.ini` in the working directory
pub fn load_config() -> Result<Configuration, ConfigError> {
    load_config_from_path(Path::new(DEFAULT_CONFIG_FILE))
}
