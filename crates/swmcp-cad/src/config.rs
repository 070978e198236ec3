//! Server configuration
//!
//! Resolved in three layers: built-in defaults, an optional JSON file,
//! then environment variables. Missing keys in the file keep their
//! defaults; environment variables override both.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::formats::ExportFormat;

/// Settings for the SolidWorks backend and the providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    // SolidWorks installation
    /// Where SolidWorks is installed
    pub solidworks_install_path: Option<PathBuf>,
    /// Release year reported in status ("2025")
    pub solidworks_version: String,
    /// Whether the SolidWorks window is shown while automating
    pub solidworks_visible: bool,

    // Backend call policy
    /// Upper bound for one backend call, in seconds
    pub solidworks_timeout: u64,
    /// Extra attempts after a transient backend failure
    pub solidworks_retry_attempts: u32,
    /// Files converted concurrently by `batch_convert`
    pub solidworks_batch_size: usize,

    // Export defaults
    pub default_export_format: ExportFormat,

    // Limits
    /// Invocations executing at once in a session
    pub max_concurrent_operations: usize,
    /// Largest input file accepted, in megabytes
    pub max_file_size_mb: u64,

    // Logging
    pub log_level: String,
    pub debug_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            solidworks_install_path: Some(PathBuf::from(
                r"C:\Program Files\SOLIDWORKS Corp\SOLIDWORKS",
            )),
            solidworks_version: "2025".to_string(),
            solidworks_visible: false,

            solidworks_timeout: 30,
            solidworks_retry_attempts: 3,
            solidworks_batch_size: 10,

            default_export_format: ExportFormat::Step,

            max_concurrent_operations: 5,
            max_file_size_mb: 100,

            log_level: "info".to_string(),
            debug_mode: false,
        }
    }
}

impl ServerConfig {
    /// Resolve configuration from an optional file and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::resolve(path, |key| std::env::var(key).ok())
    }

    /// Resolve configuration with an explicit environment lookup
    pub fn resolve(path: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Override fields from environment variables
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = var("SOLIDWORKS_INSTALL_PATH") {
            self.solidworks_install_path = Some(PathBuf::from(v));
        }
        if let Some(v) = var("SOLIDWORKS_VERSION") {
            self.solidworks_version = v;
        }
        if let Some(v) = var("SOLIDWORKS_VISIBLE") {
            self.solidworks_visible = parse_bool("SOLIDWORKS_VISIBLE", &v)?;
        }
        if let Some(v) = var("SOLIDWORKS_TIMEOUT") {
            self.solidworks_timeout = parse_number("SOLIDWORKS_TIMEOUT", &v)?;
        }
        if let Some(v) = var("SOLIDWORKS_RETRY_ATTEMPTS") {
            self.solidworks_retry_attempts = parse_number("SOLIDWORKS_RETRY_ATTEMPTS", &v)?;
        }
        if let Some(v) = var("SOLIDWORKS_BATCH_SIZE") {
            self.solidworks_batch_size = parse_number("SOLIDWORKS_BATCH_SIZE", &v)?;
        }
        if let Some(v) = var("DEFAULT_EXPORT_FORMAT") {
            self.default_export_format = ExportFormat::try_from(v)
                .map_err(|e| anyhow::anyhow!(e))
                .context("Invalid DEFAULT_EXPORT_FORMAT")?;
        }
        if let Some(v) = var("MAX_CONCURRENT_OPERATIONS") {
            self.max_concurrent_operations = parse_number("MAX_CONCURRENT_OPERATIONS", &v)?;
        }
        if let Some(v) = var("MAX_FILE_SIZE_MB") {
            self.max_file_size_mb = parse_number("MAX_FILE_SIZE_MB", &v)?;
        }
        if let Some(v) = var("LOG_LEVEL") {
            self.log_level = v.to_ascii_lowercase();
        }
        if let Some(v) = var("DEBUG_MODE") {
            self.debug_mode = parse_bool("DEBUG_MODE", &v)?;
        }

        Ok(())
    }

    /// Reject limits that would make every operation fail
    pub fn validate(&self) -> Result<()> {
        if self.solidworks_timeout == 0 {
            bail!("solidworks_timeout must be at least 1 second");
        }
        if self.solidworks_batch_size == 0 {
            bail!("solidworks_batch_size must be at least 1");
        }
        if self.max_concurrent_operations == 0 {
            bail!("max_concurrent_operations must be at least 1");
        }
        if self.max_file_size_mb == 0 {
            bail!("max_file_size_mb must be at least 1");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.solidworks_timeout)
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    /// The log level to use, with debug mode taking precedence
    pub fn effective_log_level(&self) -> &str {
        if self.debug_mode { "debug" } else { &self.log_level }
    }
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("Invalid {}: '{}' is not a valid number", key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => bail!("Invalid {}: '{}' is not a boolean", key, value),
    }
}
