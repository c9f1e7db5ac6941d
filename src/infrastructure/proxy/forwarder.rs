//! Streaming reverse proxy to the Emby backend.

use anyhow::{Context, Result};
use axum::body::{Body, HttpBody};
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use reqwest::redirect::Policy;
use reqwest::{Client as ReqwestClient, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument};

use super::headers::{add_forwarded_headers, prepare_request_headers, strip_hop_by_hop, upgrade_type};
use crate::domain::error::ForwardError;
use crate::domain::models::{ClientAddress, Config};

/// Converts a forwarding failure into the client response
pub type ErrorHook = Arc<dyn Fn(&ForwardError) -> Response + Send + Sync>;

/// Settings for the forwarder
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    /// Backend origin, e.g. `http://emby:8096`
    pub base_url: String,

    /// Add `X-Forwarded-*` headers to forwarded requests
    pub add_forwarded_headers: bool,

    /// Scheme clients used to reach the gate
    pub listener_scheme: &'static str,
}

impl From<&Config> for ForwarderConfig {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.backend.base_url.clone(),
            add_forwarded_headers: config.server.add_forwarded_headers,
            listener_scheme: if config.server.tls.is_some() { "https" } else { "http" },
        }
    }
}

/// Relays requests to the backend unchanged apart from hop-by-hop headers
///
/// Bodies stream in both directions, redirects are passed back to the
/// client, and protocol upgrades are spliced into a raw byte tunnel.
#[derive(Clone)]
pub struct Forwarder {
    http_client: ReqwestClient,
    origin: Url,
    add_forwarded_headers: bool,
    listener_scheme: &'static str,
    on_error: ErrorHook,
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("origin", &self.origin.as_str())
            .field("add_forwarded_headers", &self.add_forwarded_headers)
            .field("listener_scheme", &self.listener_scheme)
            .finish_non_exhaustive()
    }
}

impl Forwarder {
    /// Create a forwarder for the configured backend origin
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built
    pub fn new(config: ForwarderConfig) -> Result<Self> {
        let origin = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid backend URL: {}", config.base_url))?;

        let http_client = ReqwestClient::builder()
            .redirect(Policy::none())
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .context("Failed to build forwarding HTTP client")?;

        Ok(Self {
            http_client,
            origin,
            add_forwarded_headers: config.add_forwarded_headers,
            listener_scheme: config.listener_scheme,
            on_error: Arc::new(bad_gateway),
        })
    }

    /// Replace the error hook
    #[must_use]
    pub fn with_error_hook(mut self, hook: ErrorHook) -> Self {
        self.on_error = hook;
        self
    }

    /// Returns true if forwarded requests carry `X-Forwarded-*` headers
    pub const fn adds_forwarded_headers(&self) -> bool {
        self.add_forwarded_headers
    }

    /// Backend URL for an incoming request URI, keeping any base path
    pub fn target_url(&self, uri: &Uri) -> Url {
        let mut url = self.origin.clone();
        let path = format!("{}{}", self.origin.path().trim_end_matches('/'), uri.path());
        url.set_path(&path);
        url.set_query(uri.query());
        url
    }

    /// Forward a request, turning failures into a response through the error hook
    pub async fn handle(&self, request: Request, client: Option<ClientAddress>) -> Response {
        match self.forward(request, client).await {
            Ok(response) => response,
            Err(e) => (self.on_error)(&e),
        }
    }

    /// Forward a request and relay the backend response
    ///
    /// # Errors
    /// Returns [`ForwardError`] if the backend cannot be reached or the
    /// request cannot be expressed against it.
    #[instrument(skip(self, request), fields(method = %request.method(), path = %request.uri().path()))]
    pub async fn forward(
        &self,
        mut request: Request,
        client: Option<ClientAddress>,
    ) -> Result<Response, ForwardError> {
        let upgrade = upgrade_type(request.headers());
        let on_upgrade = upgrade
            .as_ref()
            .map(|_| hyper::upgrade::on(&mut request));

        let (parts, body) = request.into_parts();
        let url = self.target_url(&parts.uri);

        let original_host = parts.headers.get(header::HOST).cloned();
        let mut headers = parts.headers;
        prepare_request_headers(&mut headers, upgrade.as_ref());
        if self.add_forwarded_headers {
            add_forwarded_headers(&mut headers, client, original_host, self.listener_scheme);
        }

        let mut outbound = self
            .http_client
            .request(parts.method, url.clone())
            .headers(headers);
        // Only attach a body when there is one, so bodiless requests stay bodiless
        if body.size_hint().exact() != Some(0) {
            outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let backend = outbound.send().await.map_err(|e| {
            if e.is_builder() {
                ForwardError::InvalidTarget(format!("{url}: {e}"))
            } else {
                ForwardError::Transport(e.to_string())
            }
        })?;

        let status = backend.status();
        debug!(%status, "backend responded");

        if status == StatusCode::SWITCHING_PROTOCOLS {
            if let Some(on_upgrade) = on_upgrade {
                return Ok(switch_protocols(on_upgrade, backend));
            }
        }

        let mut response_headers = backend.headers().clone();
        strip_hop_by_hop(&mut response_headers);

        let mut response = Response::new(Body::from_stream(backend.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}

/// Answer the client's upgrade and splice both connections once established
fn switch_protocols(on_upgrade: OnUpgrade, backend: reqwest::Response) -> Response {
    let status = backend.status();
    let headers: HeaderMap<HeaderValue> = backend.headers().clone();

    tokio::spawn(async move {
        let (client, backend) = match tokio::try_join!(
            async { on_upgrade.await.map_err(|e| e.to_string()) },
            async { backend.upgrade().await.map_err(|e| e.to_string()) },
        ) {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, "upgrade failed");
                return;
            }
        };

        let mut client = TokioIo::new(client);
        let mut backend = backend;
        match tokio::io::copy_bidirectional(&mut client, &mut backend).await {
            Ok((sent, received)) => debug!(sent, received, "upgraded connection closed"),
            Err(e) => debug!(error = %e, "upgraded connection ended with error"),
        }
    });

    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Default error hook: log and answer 502 with no body
pub fn bad_gateway(error: &ForwardError) -> Response {
    error!(error = %error, "forwarding to backend failed");
    StatusCode::BAD_GATEWAY.into_response()
}
