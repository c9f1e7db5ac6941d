/// Emby HTTP API client for the session listing endpoint
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, Url};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::domain::error::SessionQueryError;
use crate::domain::models::{BackendConfig, SessionRecord};
use crate::domain::ports::SessionSource;

/// Header carrying the Emby API key
pub const EMBY_TOKEN_HEADER: &str = "X-Emby-Token";

/// Configuration for the Emby session client
#[derive(Debug, Clone)]
pub struct EmbyClientConfig {
    /// Backend origin, e.g. `http://emby:8096`
    pub base_url: String,

    /// API key sent as `X-Emby-Token`
    pub api_key: String,

    /// First path segment of API routes
    pub route_prefix: String,

    /// Bound on one session query
    pub timeout: Duration,
}

impl Default for EmbyClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8096".to_string(),
            api_key: String::new(),
            route_prefix: "emby".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl From<&BackendConfig> for EmbyClientConfig {
    fn from(config: &BackendConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            route_prefix: config.route_prefix.clone(),
            timeout: config.timeout.as_duration(),
        }
    }
}

/// Client for `GET /<prefix>/Sessions`
///
/// Features:
/// - Connection pooling and reuse (via `reqwest::Client`)
/// - Bounded per-request timeout, no retries
/// - Failures classified into [`SessionQueryError`] variants
#[derive(Debug, Clone)]
pub struct EmbyClient {
    /// Reusable HTTP client with connection pooling
    http_client: ReqwestClient,

    /// Full URL of the session listing endpoint
    sessions_url: Url,

    /// API key for authentication
    api_key: String,

    timeout: Duration,
}

impl EmbyClient {
    /// Create a new Emby client
    ///
    /// # Returns
    /// * `Ok(EmbyClient)` - Successfully created client
    /// * `Err(anyhow::Error)` - Invalid base URL or failed to build HTTP client
    pub fn new(config: EmbyClientConfig) -> Result<Self> {
        let http_client = ReqwestClient::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .context("Failed to build HTTP client")?;

        let sessions_url = sessions_url(&config.base_url, &config.route_prefix)?;

        Ok(Self {
            http_client,
            sessions_url,
            api_key: config.api_key,
            timeout: config.timeout,
        })
    }

    pub fn sessions_url(&self) -> &Url {
        &self.sessions_url
    }

    fn classify(&self, error: reqwest::Error) -> SessionQueryError {
        if error.is_timeout() {
            SessionQueryError::Timeout(self.timeout)
        } else if error.is_decode() {
            SessionQueryError::Malformed(error.to_string())
        } else {
            SessionQueryError::Unavailable(error.to_string())
        }
    }
}

/// Join `<base>/<prefix>/Sessions`, keeping any base path
fn sessions_url(base_url: &str, route_prefix: &str) -> Result<Url> {
    let mut url = Url::parse(base_url).with_context(|| format!("Invalid backend URL: {base_url}"))?;
    let path = format!(
        "{}/{}/Sessions",
        url.path().trim_end_matches('/'),
        route_prefix.trim_matches('/')
    );
    url.set_path(&path);
    url.set_query(None);
    Ok(url)
}

#[async_trait]
impl SessionSource for EmbyClient {
    #[instrument(skip(self), fields(url = %self.sessions_url))]
    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, SessionQueryError> {
        let response = self
            .http_client
            .get(self.sessions_url.clone())
            .header(EMBY_TOKEN_HEADER, &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();

        // Handle non-success status codes
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(SessionQueryError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        let sessions: Vec<SessionRecord> = serde_json::from_slice(&body)
            .map_err(|e| SessionQueryError::Malformed(e.to_string()))?;

        debug!(count = sessions.len(), "session query succeeded");
        Ok(sessions)
    }
}
