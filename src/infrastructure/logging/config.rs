use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::domain::models::Config;

/// Logging configuration resolved from [`Config`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format for stdout
    pub format: LogFormat,

    /// Directory for log files (optional, if None logs only to stdout)
    pub log_dir: Option<PathBuf>,

    /// Log rotation policy
    pub rotation: RotationPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

impl LogFormat {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            _ => bail!("Invalid log format: {value}"),
        }
    }
}

impl RotationPolicy {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "hourly" => Ok(Self::Hourly),
            "never" => Ok(Self::Never),
            _ => bail!("Invalid log rotation: {value}"),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            log_dir: None,
            rotation: RotationPolicy::default(),
        }
    }
}

impl LogConfig {
    /// Resolve logging settings, applying the debug switch
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            level: config.effective_log_level().to_string(),
            format: LogFormat::parse(&config.logging.format)?,
            log_dir: config.logging.log_dir.clone(),
            rotation: RotationPolicy::parse(&config.logging.rotation)?,
        })
    }
}
