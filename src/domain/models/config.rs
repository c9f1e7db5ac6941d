use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::HumanDuration;

/// Main configuration structure for the image gate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Emby backend configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Authorization cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Force debug level logging
    #[serde(default)]
    pub debug: bool,
}

impl Config {
    /// Log level after applying the debug switch
    pub fn effective_log_level(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.logging.level
        }
    }
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// TLS material; plain HTTP when absent
    #[serde(default)]
    pub tls: Option<TlsConfig>,

    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`
    #[serde(default)]
    pub trust_forwarded_headers: bool,

    /// Add `X-Forwarded-*` headers to forwarded requests
    #[serde(default)]
    pub add_forwarded_headers: bool,

    /// Time allowed for open connections to finish on shutdown
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace: HumanDuration,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8443
}

const fn default_shutdown_grace() -> HumanDuration {
    HumanDuration::from_secs(10)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tls: None,
            trust_forwarded_headers: false,
            add_forwarded_headers: false,
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

/// PEM encoded certificate chain and private key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TlsConfig {
    /// Path to the PEM certificate chain
    #[serde(default)]
    pub cert_path: Option<PathBuf>,

    /// Path to the PEM private key
    #[serde(default)]
    pub key_path: Option<PathBuf>,
}

/// Emby backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BackendConfig {
    /// Backend origin, e.g. `http://emby:8096`
    #[serde(default)]
    pub base_url: String,

    /// API key sent as `X-Emby-Token` on session queries
    #[serde(default)]
    pub api_key: String,

    /// First path segment of backend API routes
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,

    /// Upper bound for one session query
    #[serde(default = "default_backend_timeout")]
    pub timeout: HumanDuration,
}

fn default_route_prefix() -> String {
    "emby".to_string()
}

const fn default_backend_timeout() -> HumanDuration {
    HumanDuration::from_secs(10)
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            route_prefix: default_route_prefix(),
            timeout: default_backend_timeout(),
        }
    }
}

/// Authorization cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// How long a confirmed address skips re-confirmation
    #[serde(default = "default_ttl")]
    pub ttl: HumanDuration,

    /// Interval between sweeps of expired entries
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: HumanDuration,

    /// Maximum number of cached addresses
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

const fn default_ttl() -> HumanDuration {
    HumanDuration::from_secs(300)
}

const fn default_sweep_interval() -> HumanDuration {
    HumanDuration::from_secs(300)
}

const fn default_max_entries() -> usize {
    10_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            sweep_interval: default_sweep_interval(),
            max_entries: default_max_entries(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stdout only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// File rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
