//! Command-line interface
//!
//! Flags override values loaded from the configuration file and environment.

use clap::Parser;
use std::path::PathBuf;

use crate::domain::models::Config;

#[derive(Parser, Debug)]
#[command(name = "emby-image-gate")]
#[command(about = "Reverse proxy that gates Emby primary images on live sessions", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "EMBY_GATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Validate the configuration, print it with secrets masked, and exit
    #[arg(long)]
    pub check_config: bool,
}

impl Cli {
    /// Apply flag overrides on top of a loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if self.debug {
            config.debug = true;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}

/// Render a configuration for display with the API key masked
pub fn redacted_yaml(config: &Config) -> anyhow::Result<String> {
    let mut shown = config.clone();
    if !shown.backend.api_key.is_empty() {
        shown.backend.api_key = "********".to_string();
    }
    Ok(serde_yaml::to_string(&shown)?)
}
