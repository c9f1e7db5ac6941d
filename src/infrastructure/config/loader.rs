use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use reqwest::Url;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::domain::models::HumanDuration;
use crate::services::authorization_cache::MAX_TTL;

/// Config file read from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "emby-image-gate.yaml";

/// Prefix of nested environment overrides (`EMBY_GATE_CACHE__TTL=10m`)
pub const ENV_PREFIX: &str = "EMBY_GATE_";

/// Flat environment variables understood for drop-in compatibility with
/// existing deployments, and the config keys they map to
const LEGACY_ENV: &[(&str, &str)] = &[
    ("EMBY_BASE_URL", "backend.base_url"),
    ("EMBY_API_KEY", "backend.api_key"),
    ("SESSION_CACHE_TTL", "cache.ttl"),
    ("PORT", "server.port"),
    ("TLS_CERT_PATH", "server.tls.cert_path"),
    ("TLS_KEY_PATH", "server.tls.key_path"),
];

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Backend base URL is required (backend.base_url or EMBY_BASE_URL)")]
    MissingBaseUrl,

    #[error("Invalid backend base URL: {0}. Must be an absolute http(s) URL")]
    InvalidBaseUrl(String),

    #[error("Backend API key is required (backend.api_key or EMBY_API_KEY)")]
    MissingApiKey,

    #[error("Invalid route prefix: '{0}'. Must be a single non-empty path segment")]
    InvalidRoutePrefix(String),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("{key} is too long: {value}. Must be at most {max}")]
    DurationTooLong {
        key: &'static str,
        value: HumanDuration,
        max: HumanDuration,
    },

    #[error("Invalid max_entries: {0}. Must be at least 1")]
    InvalidMaxEntries(usize),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("TLS requires both cert_path and key_path")]
    IncompleteTls,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. YAML file (`path`, or `emby-image-gate.yaml` if present)
    /// 3. Legacy flat environment variables (`EMBY_BASE_URL`, `PORT`, ...)
    /// 4. Environment variables (`EMBY_GATE_*` prefix, `__` nesting)
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let config: Config = Self::figment(path)
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, ignoring the environment
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// The layered figment behind [`ConfigLoader::load`]
    pub fn figment(path: Option<&Path>) -> Figment {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

        let mut figment = Figment::new()
            // 1. Start with programmatic defaults
            .merge(Serialized::defaults(Config::default()))
            // 2. Merge the config file
            .merge(Yaml::file(file))
            // 3. Merge legacy flat variables
            .merge(legacy_env());
        if let Some(debug) = legacy_debug() {
            figment = figment.merge(Serialized::default("debug", debug));
        }

        // 4. Merge prefixed environment variables (highest priority)
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        // Validate backend config
        let base_url = config.backend.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        match Url::parse(base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {}
            _ => return Err(ConfigError::InvalidBaseUrl(base_url.to_string())),
        }

        if config.backend.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        let prefix = config.backend.route_prefix.trim_matches('/');
        if prefix.is_empty() || prefix.contains('/') {
            return Err(ConfigError::InvalidRoutePrefix(
                config.backend.route_prefix.clone(),
            ));
        }

        // Validate durations
        for (key, value) in [
            ("backend.timeout", config.backend.timeout),
            ("cache.ttl", config.cache.ttl),
            ("cache.sweep_interval", config.cache.sweep_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration(key));
            }
            if value.as_duration() > MAX_TTL {
                return Err(ConfigError::DurationTooLong {
                    key,
                    value,
                    max: MAX_TTL.into(),
                });
            }
        }

        // Validate cache config

        if config.cache.max_entries == 0 {
            return Err(ConfigError::InvalidMaxEntries(config.cache.max_entries));
        }

        // Validate TLS config
        if let Some(tls) = &config.server.tls {
            if tls.cert_path.is_none() || tls.key_path.is_none() {
                return Err(ConfigError::IncompleteTls);
            }
        }

        // Validate logging config
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }
}

/// The legacy `DEBUG` flag
///
/// Deployments often share `DEBUG` with other tools (`DEBUG=express:*`), so
/// only boolean-looking values are taken and anything else is ignored.
fn legacy_debug() -> Option<bool> {
    std::env::var("DEBUG")
        .ok()
        .and_then(|value| parse_flag(&value))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Provider mapping the flat legacy variables onto nested config keys
fn legacy_env() -> Env {
    let keys: Vec<&str> = LEGACY_ENV.iter().map(|(env, _)| *env).collect();

    Env::raw().only(&keys).map(|key| {
        LEGACY_ENV
            .iter()
            .find(|(env, _)| key.as_str().eq_ignore_ascii_case(env))
            .map_or_else(|| key.as_str().to_string().into(), |(_, path)| (*path).into())
    })
}
