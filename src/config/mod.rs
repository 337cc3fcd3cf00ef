//! Configuration management
//!
//! This module handles loading and managing configuration from
//! TOML files and CLI arguments.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::admission;
use crate::core::constants::{files, output_formats, timeouts};
use crate::core::error::{Result, TileGateError};
use crate::params::TileJsonParams;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Per-attempt load deadline in milliseconds
    pub timeout_ms: Option<u64>,

    /// Base against which relative URLs are resolved
    pub base_url: Option<String>,

    /// Custom User-Agent header
    pub user_agent: Option<String>,

    /// Fit the view to the loaded resource
    pub recenter: Option<bool>,

    /// Endpoint receiving error-level activity events as JSON POSTs
    pub backend_endpoint: Option<String>,

    /// Enable verbose logging
    pub verbose: Option<bool>,

    /// Output format (text, json)
    pub output_format: Option<String>,

    /// Default rendering options for TileJSON resources
    pub tilejson: Option<TileJsonParams>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_ms: Some(timeouts::DEFAULT_LOAD_TIMEOUT_MS),
            base_url: None,
            user_agent: None,
            recenter: Some(true),
            backend_endpoint: None, // Backend reporting disabled
            verbose: Some(false),
            output_format: Some(output_formats::DEFAULT.to_string()),
            tilejson: None,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            TileGateError::Config(format!(
                "Could not read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            TileGateError::Config(format!(
                "Invalid TOML in config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Candidate config file paths, nearest first
    pub fn standard_locations() -> Vec<PathBuf> {
        (0..=files::CONFIG_PARENT_LEVELS)
            .map(|level| PathBuf::from(format!("{}{}", "../".repeat(level), files::CONFIG_FILE_NAME)))
            .collect()
    }

    /// Try to find and load a config file in standard locations
    pub fn load_from_standard_locations() -> Self {
        Self::standard_locations()
            .into_iter()
            .filter(|path| path.is_file())
            .find_map(|path| match Self::load_from_file(&path) {
                Ok(config) => Some(config),
                Err(e) => {
                    log::warn!("Ignoring {}: {e}", path.display());
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Merge this config with CLI arguments (CLI takes precedence)
    pub fn merge_with_cli(&mut self, cli_config: &CliConfig) {
        if let Some(timeout_ms) = cli_config.timeout_ms {
            self.timeout_ms = Some(timeout_ms);
        }
        if let Some(ref base_url) = cli_config.base_url {
            self.base_url = Some(base_url.clone());
        }
        if cli_config.no_recenter {
            self.recenter = Some(false);
        }

        if cli_config.verbose {
            self.verbose = Some(true);
        }
        if let Some(ref output_format) = cli_config.output_format {
            self.output_format = Some(output_format.clone());
        }

        if let Some(ref user_agent) = cli_config.user_agent {
            self.user_agent = Some(user_agent.clone());
        }

        // Individual TileJSON options override the file one by one
        if let Some(ref params) = cli_config.tilejson {
            let file_params = self.tilejson.take().unwrap_or_default();
            self.tilejson = Some(params.clone().or(&file_params));
        }
    }

    /// Get the load deadline as Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(timeouts::DEFAULT_LOAD_TIMEOUT_MS))
    }

    pub fn base_context(&self) -> &str {
        self.base_url.as_deref().unwrap_or_default()
    }

    pub fn recenter(&self) -> bool {
        self.recenter.unwrap_or(true)
    }

    pub fn output_format(&self) -> &str {
        self.output_format
            .as_deref()
            .unwrap_or(output_formats::DEFAULT)
    }

    pub fn tilejson_params(&self) -> TileJsonParams {
        self.tilejson.clone().unwrap_or_default()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if let Some(timeout_ms) = self.timeout_ms
            && !(timeouts::MIN_LOAD_TIMEOUT_MS..=timeouts::MAX_LOAD_TIMEOUT_MS).contains(&timeout_ms)
        {
            return Err(TileGateError::Config(format!(
                "Timeout of {timeout_ms}ms is out of range. Expected a value between {} and {}.",
                timeouts::MIN_LOAD_TIMEOUT_MS,
                timeouts::MAX_LOAD_TIMEOUT_MS
            )));
        }

        if let Some(ref base_url) = self.base_url
            && url::Url::parse(base_url).is_err()
        {
            return Err(TileGateError::Config(format!(
                "Base URL '{base_url}' is not an absolute URL."
            )));
        }

        if let Some(ref format) = self.output_format
            && !output_formats::ALL.contains(&format.as_str())
        {
            return Err(TileGateError::Config(format!(
                "Invalid output format '{format}'. Expected one of: {}.",
                output_formats::ALL.join(", ")
            )));
        }

        // The reporter must not become a way around the admission gate
        if let Some(ref endpoint) = self.backend_endpoint {
            let verdict = admission::validate(endpoint, self.base_context());
            if let Some(err) = verdict.error {
                return Err(TileGateError::Config(format!(
                    "Backend endpoint '{endpoint}' is not allowed: {err}"
                )));
            }
        }

        Ok(())
    }
}

/// Configuration options that can come from CLI
#[derive(Debug, Default)]
pub struct CliConfig {
    pub timeout_ms: Option<u64>,       // --timeout-ms
    pub base_url: Option<String>,      // --base
    pub no_recenter: bool,             // --no-recenter
    pub tilejson: Option<TileJsonParams>,

    pub quiet: bool,                   // --quiet
    pub verbose: bool,                 // --verbose
    pub output_format: Option<String>, // --format

    pub user_agent: Option<String>, // --user-agent

    pub config_file: Option<String>, // --config
    pub no_config: bool,             // --no-config
}
